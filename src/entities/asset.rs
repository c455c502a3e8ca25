use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of an asset.
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
pub enum AssetStatus {
    #[sea_orm(string_value = "Active")]
    Active,
    #[sea_orm(string_value = "Inactive")]
    Inactive,
    #[sea_orm(string_value = "Disposed")]
    Disposed,
    #[sea_orm(string_value = "Broken")]
    Broken,
    #[sea_orm(string_value = "Lost/Missing")]
    #[serde(rename = "Lost/Missing")]
    #[strum(serialize = "Lost/Missing")]
    LostMissing,
    #[sea_orm(string_value = "Sell")]
    Sell,
    #[sea_orm(string_value = "Unidentified")]
    Unidentified,
}

impl AssetStatus {
    /// Statuses that still count toward an audit's expected total.
    pub fn is_countable(self) -> bool {
        !matches!(self, AssetStatus::Disposed | AssetStatus::Sell)
    }
}

impl FromStr for AssetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "disposed" => Ok(Self::Disposed),
            "broken" => Ok(Self::Broken),
            "lostmissing" | "lost" | "missing" => Ok(Self::LostMissing),
            "sell" | "sold" => Ok(Self::Sell),
            "unidentified" => Ok(Self::Unidentified),
            _ => Err(format!("unknown asset status '{}'", s.trim())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "assets")]
#[schema(as = Asset)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Identifying number, `PREFIX/<roman category>/<site>` when generated.
    #[sea_orm(unique)]
    pub no_asset: String,
    pub name: String,
    pub status: AssetStatus,
    pub serial_no: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((16, 2)))", nullable)]
    pub cost: Option<Decimal>,
    pub site_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub pic_id: Option<Uuid>,
    pub pic: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// The "additional fields" some assets keep in `notes` as a flat JSON
    /// object. Non-string values are rendered with their JSON text.
    pub fn additional_fields(&self) -> Option<BTreeMap<String, String>> {
        let notes = self.notes.as_deref()?.trim();
        if !notes.starts_with('{') {
            return None;
        }
        let parsed: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(notes).ok()?;
        Some(
            parsed
                .into_iter()
                .map(|(k, v)| {
                    let v = match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (k, v)
                })
                .collect(),
        )
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::site::Entity",
        from = "Column::SiteId",
        to = "super::site::Column::Id"
    )]
    Site,
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::department::Entity",
        from = "Column::DepartmentId",
        to = "super::department::Column::Id"
    )]
    Department,
    #[sea_orm(
        belongs_to = "super::employee::Entity",
        from = "Column::PicId",
        to = "super::employee::Column::Id"
    )]
    Pic,
    #[sea_orm(has_many = "super::so_asset_entry::Entity")]
    SoEntries,
    #[sea_orm(has_many = "super::asset_checkout::Entity")]
    Checkouts,
}

impl Related<super::site::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Site.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::department::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Department.def()
    }
}

impl Related<super::employee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pic.def()
    }
}

impl Related<super::so_asset_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SoEntries.def()
    }
}

impl Related<super::asset_checkout::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Checkouts.def()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_accepts_loose_spellings() {
        assert_eq!("Lost/Missing".parse::<AssetStatus>().unwrap(), AssetStatus::LostMissing);
        assert_eq!("lost-missing".parse::<AssetStatus>().unwrap(), AssetStatus::LostMissing);
        assert_eq!("MISSING".parse::<AssetStatus>().unwrap(), AssetStatus::LostMissing);
        assert_eq!(" active ".parse::<AssetStatus>().unwrap(), AssetStatus::Active);
        assert!("stolen".parse::<AssetStatus>().is_err());
        assert_eq!(AssetStatus::LostMissing.to_string(), "Lost/Missing");
    }

    #[test]
    fn disposed_and_sold_assets_are_not_counted() {
        assert!(!AssetStatus::Disposed.is_countable());
        assert!(!AssetStatus::Sell.is_countable());
        assert!(AssetStatus::Broken.is_countable());
    }

    fn with_notes(notes: Option<&str>) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            no_asset: "0001/I/001".into(),
            name: "Laptop".into(),
            status: AssetStatus::Active,
            serial_no: None,
            brand: None,
            model: None,
            cost: None,
            site_id: None,
            category_id: None,
            department_id: None,
            pic_id: None,
            pic: None,
            notes: notes.map(str::to_string),
            image_url: None,
            purchase_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn additional_fields_only_for_json_objects() {
        let fields = with_notes(Some(r#"{"color":"black","ram":16}"#))
            .additional_fields()
            .unwrap();
        assert_eq!(fields.get("color").map(String::as_str), Some("black"));
        assert_eq!(fields.get("ram").map(String::as_str), Some("16"));

        assert!(with_notes(Some("plain text note")).additional_fields().is_none());
        assert!(with_notes(Some("{broken")).additional_fields().is_none());
        assert!(with_notes(None).additional_fields().is_none());
    }
}
