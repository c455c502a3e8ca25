use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::asset::AssetStatus;

/// One scanned asset within a session. The `temp_*` columns stage edits that
/// are copied onto the asset only when the session completes.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "so_asset_entries")]
#[schema(as = SoAssetEntry)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub so_session_id: Uuid,
    pub asset_id: Uuid,
    pub scanned_at: DateTime<Utc>,
    pub scanned_by: Option<Uuid>,
    pub is_identified: bool,
    pub temp_name: Option<String>,
    pub temp_status: Option<AssetStatus>,
    pub temp_serial_no: Option<String>,
    pub temp_pic: Option<String>,
    pub temp_pic_id: Option<Uuid>,
    #[sea_orm(column_type = "Text", nullable)]
    pub temp_notes: Option<String>,
    pub temp_brand: Option<String>,
    pub temp_model: Option<String>,
    pub temp_site_id: Option<Uuid>,
    pub temp_category_id: Option<Uuid>,
    pub temp_department_id: Option<Uuid>,
    pub temp_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::so_session::Entity",
        from = "Column::SoSessionId",
        to = "super::so_session::Column::Id",
        on_delete = "Cascade"
    )]
    Session,
    #[sea_orm(
        belongs_to = "super::asset::Entity",
        from = "Column::AssetId",
        to = "super::asset::Column::Id"
    )]
    Asset,
}

impl Related<super::so_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::asset::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Asset.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}
