//! Restore straight into the service database, all tables in one transaction.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, DatabaseTransaction, DbErr, EntityTrait, IntoActiveModel,
};
use std::sync::Arc;
use tracing::debug;

use super::engine::{EngineKind, PreparedRestore, RestoreEngine, TableReport};
use super::plan::is_known_table;
use super::transform::TableRows;
use super::BackupError;
use crate::db::{with_transaction, DbPool};
use crate::entities::{
    asset, asset_checkout, category, department, employee, site, so_asset_entry, so_session, user,
};
use crate::errors::ServiceError;

pub struct SqlEngine {
    db_pool: Arc<DbPool>,
    batch_size: usize,
}

impl SqlEngine {
    pub fn new(db_pool: Arc<DbPool>, batch_size: usize) -> Self {
        Self {
            db_pool,
            batch_size: batch_size.max(1),
        }
    }
}

/// Models as fully-set active models, so every column is inserted.
fn active<M, A>(rows: Vec<M>) -> Vec<A>
where
    M: IntoActiveModel<A>,
    A: ActiveModelTrait,
{
    rows.into_iter()
        .map(|m| m.into_active_model().reset_all())
        .collect()
}

async fn insert_batched<E, A>(
    txn: &DatabaseTransaction,
    rows: Vec<A>,
    batch_size: usize,
) -> Result<u64, DbErr>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<A>,
    A: ActiveModelTrait<Entity = E> + Send,
{
    let total = rows.len() as u64;
    let mut rows = rows.into_iter().peekable();
    while rows.peek().is_some() {
        let chunk: Vec<A> = rows.by_ref().take(batch_size).collect();
        E::insert_many(chunk).exec_without_returning(txn).await?;
    }
    Ok(total)
}

async fn clear_table(txn: &DatabaseTransaction, table: &str) -> Result<u64, DbErr> {
    let result = match table {
        "sites" => site::Entity::delete_many().exec(txn).await?,
        "categories" => category::Entity::delete_many().exec(txn).await?,
        "departments" => department::Entity::delete_many().exec(txn).await?,
        "employees" => employee::Entity::delete_many().exec(txn).await?,
        "users" => user::Entity::delete_many().exec(txn).await?,
        "assets" => asset::Entity::delete_many().exec(txn).await?,
        "so_sessions" => so_session::Entity::delete_many().exec(txn).await?,
        "so_asset_entries" => so_asset_entry::Entity::delete_many().exec(txn).await?,
        "asset_checkouts" => asset_checkout::Entity::delete_many().exec(txn).await?,
        _ => return Ok(0),
    };
    Ok(result.rows_affected)
}

async fn insert_rows(
    txn: &DatabaseTransaction,
    rows: TableRows,
    batch: usize,
) -> Result<u64, DbErr> {
    match rows {
        TableRows::Sites(r) => insert_batched::<site::Entity, _>(txn, active(r), batch).await,
        TableRows::Categories(r) => {
            insert_batched::<category::Entity, _>(txn, active(r), batch).await
        }
        TableRows::Departments(r) => {
            insert_batched::<department::Entity, _>(txn, active(r), batch).await
        }
        TableRows::Employees(r) => {
            insert_batched::<employee::Entity, _>(txn, active(r), batch).await
        }
        TableRows::Users(r) => insert_batched::<user::Entity, _>(txn, active(r), batch).await,
        TableRows::Assets(r) => insert_batched::<asset::Entity, _>(txn, active(r), batch).await,
        TableRows::SoSessions(r) => {
            insert_batched::<so_session::Entity, _>(txn, active(r), batch).await
        }
        TableRows::SoAssetEntries(r) => {
            insert_batched::<so_asset_entry::Entity, _>(txn, active(r), batch).await
        }
        TableRows::AssetCheckouts(r) => {
            insert_batched::<asset_checkout::Entity, _>(txn, active(r), batch).await
        }
        TableRows::Unknown(_) => Ok(0),
    }
}

#[async_trait]
impl RestoreEngine for SqlEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Sql
    }

    async fn restore(&self, prepared: &PreparedRestore) -> Result<Vec<TableReport>, BackupError> {
        let order = prepared.order.clone();
        let tables = prepared.tables.clone();
        let batch = self.batch_size;

        with_transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                for table in order.iter().rev() {
                    let removed = clear_table(txn, table).await?;
                    debug!(table = %table, removed, "table cleared");
                }

                let mut tables = tables;
                let mut reports = Vec::with_capacity(order.len());
                for table in &order {
                    if !is_known_table(table) {
                        if tables.contains_key(table) {
                            reports.push(TableReport::skipped(table, "unknown table"));
                        }
                        continue;
                    }
                    let inserted = match tables.remove(table) {
                        Some(rows) => insert_rows(txn, rows, batch).await?,
                        None => 0,
                    };
                    reports.push(TableReport::inserted(table, inserted));
                }
                Ok(reports)
            })
        })
        .await
        .map_err(|e| match e {
            ServiceError::Backup(inner) => inner,
            other => BackupError::Engine(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::transform::transform_table;
    use sea_orm::PaginatorTrait;
    use serde_json::json;
    use std::collections::BTreeMap;

    async fn engine() -> (SqlEngine, Arc<DbPool>) {
        let db = crate::db::establish_connection("sqlite::memory:")
            .await
            .unwrap();
        crate::db::run_migrations(&db).await.unwrap();
        let db = Arc::new(db);
        (SqlEngine::new(db.clone(), 2), db)
    }

    fn prepared(dump: serde_json::Value) -> PreparedRestore {
        let dump = dump.as_object().unwrap();
        let order = crate::backup::plan::restore_order(None, dump.keys().map(String::as_str));
        let mut tables = BTreeMap::new();
        for (name, rows) in dump {
            tables.insert(
                name.clone(),
                transform_table(name, rows.as_array().unwrap()).unwrap(),
            );
        }
        PreparedRestore { order, tables }
    }

    async fn seed_old_site(db: &DbPool) {
        site::ActiveModel {
            id: sea_orm::Set(uuid::Uuid::new_v4()),
            name: sea_orm::Set("Old".into()),
            sort_order: sea_orm::Set(1),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn replaces_contents_and_reports_counts() {
        let (engine, db) = engine().await;
        seed_old_site(&db).await;

        let reports = engine
            .restore(&prepared(json!({
                "sites": [{"id": 1, "name": "A"}, {"id": 2, "name": "B"}, {"id": 3, "name": "C"}],
                "assets": [{"id": 10, "no_asset": "N-1", "name": "Desk", "site_id": 2}],
                "audit_logs": [{"x": 1}]
            })))
            .await
            .unwrap();

        assert_eq!(site::Entity::find().count(&*db).await.unwrap(), 3);
        let desk = asset::Entity::find().one(&*db).await.unwrap().unwrap();
        assert_eq!(desk.site_id, Some(crate::backup::transform::mapped_id("sites", "2")));

        let sites = reports.iter().find(|r| r.table == "sites").unwrap();
        assert_eq!(sites.inserted, 3);
        let unknown = reports.iter().find(|r| r.table == "audit_logs").unwrap();
        assert!(unknown.skipped);
    }

    #[tokio::test]
    async fn failure_rolls_everything_back() {
        let (engine, db) = engine().await;
        seed_old_site(&db).await;
        let err = engine
            .restore(&prepared(json!({
                "sites": [{"id": 1, "name": "Same"}, {"id": 2, "name": "Same"}]
            })))
            .await;
        assert!(err.is_err());
        let left = site::Entity::find().all(&*db).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "Old");
    }
}
