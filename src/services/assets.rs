use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::asset_number::AssetNumberService;
use crate::{
    db::DbPool,
    entities::{
        asset, asset_checkout, so_asset_entry, so_session, AssetStatus, CheckoutStatus,
        SessionStatus,
    },
    errors::ServiceError,
};

/// Query filters for the asset list.
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AssetFilter {
    /// Matches name, asset number or serial number
    pub search: Option<String>,
    pub status: Option<AssetStatus>,
    pub site_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub pic_id: Option<Uuid>,
}

#[derive(Debug, Default, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateAssetInput {
    /// Generated from category and site when omitted
    #[validate(length(min = 1, max = 64))]
    pub no_asset: Option<String>,
    /// Prefix used when the number is generated
    pub prefix: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub status: Option<AssetStatus>,
    pub serial_no: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub cost: Option<Decimal>,
    pub site_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub pic_id: Option<Uuid>,
    pub pic: Option<String>,
    pub notes: Option<String>,
    #[validate(length(max = 2048))]
    pub image_url: Option<String>,
    pub purchase_date: Option<NaiveDate>,
}

/// Partial update; absent fields keep their value.
#[derive(Debug, Default, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateAssetInput {
    #[validate(length(min = 1, max = 64))]
    pub no_asset: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub status: Option<AssetStatus>,
    pub serial_no: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub cost: Option<Decimal>,
    pub site_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub pic_id: Option<Uuid>,
    pub pic: Option<String>,
    pub notes: Option<String>,
    #[validate(length(max = 2048))]
    pub image_url: Option<String>,
    pub purchase_date: Option<NaiveDate>,
}

/// An asset with the extra key/value fields carried in its notes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssetDetail {
    #[serde(flatten)]
    pub asset: asset::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_fields: Option<BTreeMap<String, String>>,
}

impl From<asset::Model> for AssetDetail {
    fn from(asset: asset::Model) -> Self {
        let additional_fields = asset.additional_fields();
        Self {
            asset,
            additional_fields,
        }
    }
}

/// Service for managing assets
#[derive(Clone)]
pub struct AssetService {
    db_pool: Arc<DbPool>,
    numbers: AssetNumberService,
}

impl AssetService {
    pub fn new(db_pool: Arc<DbPool>, numbers: AssetNumberService) -> Self {
        Self { db_pool, numbers }
    }

    /// Lists assets, newest first, returning the page and the total count.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &AssetFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<asset::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = asset::Entity::find();

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(asset::Column::Name.contains(search))
                    .add(asset::Column::NoAsset.contains(search))
                    .add(asset::Column::SerialNo.contains(search)),
            );
        }
        if let Some(status) = filter.status {
            query = query.filter(asset::Column::Status.eq(status));
        }
        if let Some(id) = filter.site_id {
            query = query.filter(asset::Column::SiteId.eq(id));
        }
        if let Some(id) = filter.category_id {
            query = query.filter(asset::Column::CategoryId.eq(id));
        }
        if let Some(id) = filter.department_id {
            query = query.filter(asset::Column::DepartmentId.eq(id));
        }
        if let Some(id) = filter.pic_id {
            query = query.filter(asset::Column::PicId.eq(id));
        }

        let paginator = query
            .order_by_desc(asset::Column::CreatedAt)
            .paginate(db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<asset::Model, ServiceError> {
        asset::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Asset", id))
    }

    #[instrument(skip(self))]
    pub async fn find_by_number(&self, no_asset: &str) -> Result<Option<asset::Model>, ServiceError> {
        Ok(asset::Entity::find()
            .filter(asset::Column::NoAsset.eq(no_asset.trim()))
            .one(&*self.db_pool)
            .await?)
    }

    /// Creates an asset. Without an explicit number, one is generated when
    /// both category and site are known.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CreateAssetInput) -> Result<asset::Model, ServiceError> {
        let no_asset = match input.no_asset.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(number) => number.to_string(),
            None => match (input.category_id, input.site_id) {
                (Some(category_id), Some(site_id)) => {
                    self.numbers
                        .generate(category_id, site_id, input.prefix.clone())
                        .await?
                }
                _ => {
                    return Err(ServiceError::ValidationError(
                        "no_asset is required unless both category_id and site_id are given"
                            .into(),
                    ))
                }
            },
        };

        self.ensure_number_free(&no_asset, None).await?;

        let model = asset::ActiveModel {
            id: Set(Uuid::new_v4()),
            no_asset: Set(no_asset),
            name: Set(input.name.trim().to_string()),
            status: Set(input.status.unwrap_or(AssetStatus::Active)),
            serial_no: Set(input.serial_no),
            brand: Set(input.brand),
            model: Set(input.model),
            cost: Set(input.cost),
            site_id: Set(input.site_id),
            category_id: Set(input.category_id),
            department_id: Set(input.department_id),
            pic_id: Set(input.pic_id),
            pic: Set(input.pic),
            notes: Set(input.notes),
            image_url: Set(input.image_url),
            purchase_date: Set(input.purchase_date),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(asset_id = %model.id, no_asset = %model.no_asset, "asset created");
        Ok(model)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdateAssetInput) -> Result<asset::Model, ServiceError> {
        let existing = self.get(id).await?;

        if let Some(number) = input.no_asset.as_deref().map(str::trim) {
            if number != existing.no_asset {
                self.ensure_number_free(number, Some(id)).await?;
            }
        }

        let mut active = existing.into_active_model();
        if let Some(v) = input.no_asset {
            active.no_asset = Set(v.trim().to_string());
        }
        if let Some(v) = input.name {
            active.name = Set(v.trim().to_string());
        }
        if let Some(v) = input.status {
            active.status = Set(v);
        }
        if input.serial_no.is_some() {
            active.serial_no = Set(input.serial_no);
        }
        if input.brand.is_some() {
            active.brand = Set(input.brand);
        }
        if input.model.is_some() {
            active.model = Set(input.model);
        }
        if input.cost.is_some() {
            active.cost = Set(input.cost);
        }
        if input.site_id.is_some() {
            active.site_id = Set(input.site_id);
        }
        if input.category_id.is_some() {
            active.category_id = Set(input.category_id);
        }
        if input.department_id.is_some() {
            active.department_id = Set(input.department_id);
        }
        if input.pic_id.is_some() {
            active.pic_id = Set(input.pic_id);
        }
        if input.pic.is_some() {
            active.pic = Set(input.pic);
        }
        if input.notes.is_some() {
            active.notes = Set(input.notes);
        }
        if input.image_url.is_some() {
            active.image_url = Set(input.image_url);
        }
        if input.purchase_date.is_some() {
            active.purchase_date = Set(input.purchase_date);
        }

        Ok(active.update(&*self.db_pool).await?)
    }

    /// Deletes an asset unless it is checked out or under audit in an active
    /// session. Returned check-outs and entries of finished sessions go with it.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let existing = self.get(id).await?;

        let out = asset_checkout::Entity::find()
            .filter(asset_checkout::Column::AssetId.eq(id))
            .filter(asset_checkout::Column::Status.eq(CheckoutStatus::Out))
            .count(db)
            .await?;
        if out > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "asset {} is checked out and cannot be deleted",
                existing.no_asset
            )));
        }

        let under_audit = so_asset_entry::Entity::find()
            .filter(so_asset_entry::Column::AssetId.eq(id))
            .inner_join(so_session::Entity)
            .filter(so_session::Column::Status.eq(SessionStatus::Active))
            .count(db)
            .await?;
        if under_audit > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "asset {} is part of an active stock opname session",
                existing.no_asset
            )));
        }

        asset::Entity::delete_by_id(id).exec(db).await?;
        info!(asset_id = %id, "asset deleted");
        Ok(())
    }

    /// Preview of the number a new asset would receive.
    pub async fn generate_number(
        &self,
        category_id: Uuid,
        site_id: Uuid,
        prefix: Option<String>,
    ) -> Result<String, ServiceError> {
        self.numbers.generate(category_id, site_id, prefix).await
    }

    /// All assets ordered by number, used by CSV export.
    #[instrument(skip(self))]
    pub async fn all(&self) -> Result<Vec<asset::Model>, ServiceError> {
        Ok(asset::Entity::find()
            .order_by_asc(asset::Column::NoAsset)
            .all(&*self.db_pool)
            .await?)
    }

    async fn ensure_number_free(&self, no_asset: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = asset::Entity::find().filter(asset::Column::NoAsset.eq(no_asset));
        if let Some(id) = except {
            query = query.filter(asset::Column::Id.ne(id));
        }
        if query.count(&*self.db_pool).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "asset number {} already exists",
                no_asset
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn asset_with_notes(notes: Option<&str>) -> asset::Model {
        let now = Utc::now();
        asset::Model {
            id: Uuid::new_v4(),
            no_asset: "INV/I/001".into(),
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
    fn detail_flattens_the_asset() {
        let detail = AssetDetail::from(asset_with_notes(Some(r#"{"floor": "2"}"#)));
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["no_asset"], "INV/I/001");
        assert_eq!(json["additional_fields"]["floor"], "2");
    }
}
