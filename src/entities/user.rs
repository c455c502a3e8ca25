use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Account role. Permissions are derived from it in [`crate::auth::rbac`].
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum UserRole {
    #[sea_orm(string_value = "ADMIN")]
    #[serde(rename = "ADMIN")]
    #[strum(serialize = "ADMIN")]
    Admin,
    #[sea_orm(string_value = "SO_ASSET_USER")]
    #[serde(rename = "SO_ASSET_USER")]
    #[strum(serialize = "SO_ASSET_USER")]
    SoAssetUser,
    #[sea_orm(string_value = "VIEWER")]
    #[serde(rename = "VIEWER")]
    #[strum(serialize = "VIEWER")]
    Viewer,
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace(['-', ' '], "_").as_str() {
            "ADMIN" => Ok(Self::Admin),
            "SO_ASSET_USER" | "SOASSETUSER" => Ok(Self::SoAssetUser),
            "VIEWER" => Ok(Self::Viewer),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Login account. Never returned from the API as-is; handlers map it onto a
/// response type without the password hash.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_loosely_and_displays_canonically() {
        assert_eq!("so-asset-user".parse::<UserRole>().unwrap(), UserRole::SoAssetUser);
        assert_eq!(" viewer ".parse::<UserRole>().unwrap(), UserRole::Viewer);
        assert!("root".parse::<UserRole>().is_err());
        assert_eq!(UserRole::SoAssetUser.to_string(), "SO_ASSET_USER");
    }
}
