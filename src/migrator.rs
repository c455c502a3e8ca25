use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_lookup_tables::Migration),
            Box::new(m20240101_000002_create_employees_table::Migration),
            Box::new(m20240101_000003_create_users_table::Migration),
            Box::new(m20240101_000004_create_assets_table::Migration),
            Box::new(m20240101_000005_create_so_tables::Migration),
            Box::new(m20240101_000006_create_asset_checkouts_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_lookup_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    const TABLES: [&str; 3] = ["sites", "categories", "departments"];

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_lookup_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // sites, categories and departments share one shape
            for table in TABLES {
                manager
                    .create_table(
                        Table::create()
                            .table(Alias::new(table))
                            .if_not_exists()
                            .col(ColumnDef::new(Lookup::Id).uuid().not_null().primary_key())
                            .col(ColumnDef::new(Lookup::Name).string().not_null().unique_key())
                            .col(
                                ColumnDef::new(Lookup::SortOrder)
                                    .integer()
                                    .not_null()
                                    .default(0),
                            )
                            .col(
                                ColumnDef::new(Lookup::CreatedAt)
                                    .timestamp_with_time_zone()
                                    .not_null(),
                            )
                            .col(
                                ColumnDef::new(Lookup::UpdatedAt)
                                    .timestamp_with_time_zone()
                                    .not_null(),
                            )
                            .to_owned(),
                    )
                    .await?;
            }
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in TABLES.iter().rev() {
                manager
                    .drop_table(Table::drop().table(Alias::new(*table)).to_owned())
                    .await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Lookup {
        Id,
        Name,
        SortOrder,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_employees_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_employees_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Employees::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Employees::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(Employees::EmployeeCode)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Employees::Name).string().not_null())
                        .col(ColumnDef::new(Employees::Email).string().null())
                        .col(ColumnDef::new(Employees::Phone).string().null())
                        .col(ColumnDef::new(Employees::Department).string().null())
                        .col(ColumnDef::new(Employees::Position).string().null())
                        .col(
                            ColumnDef::new(Employees::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Employees::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Employees::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_employees_name")
                        .table(Employees::Table)
                        .col(Employees::Name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Employees::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Employees {
        Table,
        Id,
        EmployeeCode,
        Name,
        Email,
        Phone,
        Department,
        Position,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_users_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Users::Role).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Email,
        Name,
        PasswordHash,
        Role,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_assets_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_assets_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Assets::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Assets::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Assets::NoAsset).string().not_null().unique_key())
                        .col(ColumnDef::new(Assets::Name).string().not_null())
                        .col(ColumnDef::new(Assets::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Assets::SerialNo).string().null())
                        .col(ColumnDef::new(Assets::Brand).string().null())
                        .col(ColumnDef::new(Assets::Model).string().null())
                        .col(ColumnDef::new(Assets::Cost).decimal_len(16, 2).null())
                        .col(ColumnDef::new(Assets::SiteId).uuid().null())
                        .col(ColumnDef::new(Assets::CategoryId).uuid().null())
                        .col(ColumnDef::new(Assets::DepartmentId).uuid().null())
                        .col(ColumnDef::new(Assets::PicId).uuid().null())
                        .col(ColumnDef::new(Assets::Pic).string().null())
                        .col(ColumnDef::new(Assets::Notes).text().null())
                        .col(ColumnDef::new(Assets::ImageUrl).string().null())
                        .col(ColumnDef::new(Assets::PurchaseDate).date().null())
                        .col(
                            ColumnDef::new(Assets::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Assets::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        // Lookups and PICs in use cannot be removed
                        .foreign_key(&mut restrict("fk_assets_site", Assets::SiteId, "sites"))
                        .foreign_key(&mut restrict(
                            "fk_assets_category",
                            Assets::CategoryId,
                            "categories",
                        ))
                        .foreign_key(&mut restrict(
                            "fk_assets_department",
                            Assets::DepartmentId,
                            "departments",
                        ))
                        .foreign_key(&mut restrict("fk_assets_pic", Assets::PicId, "employees"))
                        .to_owned(),
                )
                .await?;

            // Lookup filters and the per category+site running number
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_assets_category_site")
                        .table(Assets::Table)
                        .col(Assets::CategoryId)
                        .col(Assets::SiteId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_assets_status")
                        .table(Assets::Table)
                        .col(Assets::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_assets_pic_id")
                        .table(Assets::Table)
                        .col(Assets::PicId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Assets::Table).to_owned())
                .await
        }
    }

    fn restrict(name: &str, column: Assets, parent: &str) -> ForeignKeyCreateStatement {
        ForeignKey::create()
            .name(name)
            .from(Assets::Table, column)
            .to(Alias::new(parent), Alias::new("id"))
            .on_delete(ForeignKeyAction::Restrict)
            .on_update(ForeignKeyAction::Cascade)
            .to_owned()
    }

    #[derive(DeriveIden)]
    enum Assets {
        Table,
        Id,
        NoAsset,
        Name,
        Status,
        SerialNo,
        Brand,
        Model,
        Cost,
        SiteId,
        CategoryId,
        DepartmentId,
        PicId,
        Pic,
        Notes,
        ImageUrl,
        PurchaseDate,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000005_create_so_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_so_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SoSessions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(SoSessions::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(SoSessions::Name).string().not_null())
                        .col(ColumnDef::new(SoSessions::Year).integer().not_null())
                        .col(ColumnDef::new(SoSessions::Description).text().null())
                        .col(ColumnDef::new(SoSessions::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(SoSessions::TotalAssets)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SoSessions::ScannedAssets)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SoSessions::VerifiedAssets)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SoSessions::StartedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SoSessions::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(SoSessions::CreatedBy).uuid().null())
                        .col(
                            ColumnDef::new(SoSessions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SoSessions::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SoAssetEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SoAssetEntries::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(SoAssetEntries::SoSessionId).uuid().not_null())
                        .col(ColumnDef::new(SoAssetEntries::AssetId).uuid().not_null())
                        .col(
                            ColumnDef::new(SoAssetEntries::ScannedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SoAssetEntries::ScannedBy).uuid().null())
                        .col(
                            ColumnDef::new(SoAssetEntries::IsIdentified)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(SoAssetEntries::TempName).string().null())
                        .col(ColumnDef::new(SoAssetEntries::TempStatus).string_len(32).null())
                        .col(ColumnDef::new(SoAssetEntries::TempSerialNo).string().null())
                        .col(ColumnDef::new(SoAssetEntries::TempPic).string().null())
                        .col(ColumnDef::new(SoAssetEntries::TempPicId).uuid().null())
                        .col(ColumnDef::new(SoAssetEntries::TempNotes).text().null())
                        .col(ColumnDef::new(SoAssetEntries::TempBrand).string().null())
                        .col(ColumnDef::new(SoAssetEntries::TempModel).string().null())
                        .col(ColumnDef::new(SoAssetEntries::TempSiteId).uuid().null())
                        .col(ColumnDef::new(SoAssetEntries::TempCategoryId).uuid().null())
                        .col(ColumnDef::new(SoAssetEntries::TempDepartmentId).uuid().null())
                        .col(ColumnDef::new(SoAssetEntries::TempImageUrl).string().null())
                        .col(
                            ColumnDef::new(SoAssetEntries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SoAssetEntries::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_so_asset_entries_session")
                                .from(SoAssetEntries::Table, SoAssetEntries::SoSessionId)
                                .to(SoSessions::Table, SoSessions::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        // Entries of finished sessions go with the asset
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_so_asset_entries_asset")
                                .from(SoAssetEntries::Table, SoAssetEntries::AssetId)
                                .to(Alias::new("assets"), Alias::new("id"))
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // One entry per asset per session
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_so_asset_entries_session_asset")
                        .table(SoAssetEntries::Table)
                        .col(SoAssetEntries::SoSessionId)
                        .col(SoAssetEntries::AssetId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SoAssetEntries::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SoSessions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SoSessions {
        Table,
        Id,
        Name,
        Year,
        Description,
        Status,
        TotalAssets,
        ScannedAssets,
        VerifiedAssets,
        StartedAt,
        CompletedAt,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum SoAssetEntries {
        Table,
        Id,
        SoSessionId,
        AssetId,
        ScannedAt,
        ScannedBy,
        IsIdentified,
        TempName,
        TempStatus,
        TempSerialNo,
        TempPic,
        TempPicId,
        TempNotes,
        TempBrand,
        TempModel,
        TempSiteId,
        TempCategoryId,
        TempDepartmentId,
        TempImageUrl,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000006_create_asset_checkouts_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_asset_checkouts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AssetCheckouts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AssetCheckouts::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(AssetCheckouts::AssetId).uuid().not_null())
                        .col(ColumnDef::new(AssetCheckouts::EmployeeId).uuid().null())
                        .col(ColumnDef::new(AssetCheckouts::AssignedTo).string().not_null())
                        .col(
                            ColumnDef::new(AssetCheckouts::CheckoutDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AssetCheckouts::DueDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(AssetCheckouts::ReturnDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(AssetCheckouts::CheckoutSignature).text().null())
                        .col(ColumnDef::new(AssetCheckouts::ReturnSignature).text().null())
                        .col(ColumnDef::new(AssetCheckouts::Notes).text().null())
                        .col(ColumnDef::new(AssetCheckouts::Status).string_len(16).not_null())
                        .col(
                            ColumnDef::new(AssetCheckouts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AssetCheckouts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        // Returned history goes with the asset
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_asset_checkouts_asset")
                                .from(AssetCheckouts::Table, AssetCheckouts::AssetId)
                                .to(Alias::new("assets"), Alias::new("id"))
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        // `assigned_to` keeps the name when the employee is removed
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_asset_checkouts_employee")
                                .from(AssetCheckouts::Table, AssetCheckouts::EmployeeId)
                                .to(Alias::new("employees"), Alias::new("id"))
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_asset_checkouts_asset_status")
                        .table(AssetCheckouts::Table)
                        .col(AssetCheckouts::AssetId)
                        .col(AssetCheckouts::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AssetCheckouts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum AssetCheckouts {
        Table,
        Id,
        AssetId,
        EmployeeId,
        AssignedTo,
        CheckoutDate,
        DueDate,
        ReturnDate,
        CheckoutSignature,
        ReturnSignature,
        Notes,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_apply_and_revert_on_sqlite() {
        let db = crate::db::establish_connection("sqlite::memory:")
            .await
            .unwrap();
        Migrator::up(&db, None).await.unwrap();
        assert_eq!(Migrator::get_applied_migrations(&db).await.unwrap().len(), 6);
        Migrator::down(&db, None).await.unwrap();
        assert!(Migrator::get_applied_migrations(&db).await.unwrap().is_empty());
    }
}
