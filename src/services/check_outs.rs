use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{asset, asset_checkout, employee, CheckoutStatus},
    errors::ServiceError,
};

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CheckoutFilter {
    pub status: Option<CheckoutStatus>,
    pub asset_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCheckoutInput {
    pub asset_id: Uuid,
    pub employee_id: Option<Uuid>,
    /// Borrower name; taken from the employee when omitted
    #[validate(length(min = 1, max = 255))]
    pub assigned_to: Option<String>,
    /// Defaults to now
    pub checkout_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub checkout_signature: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CheckInInput {
    pub return_date: Option<DateTime<Utc>>,
    pub return_signature: Option<String>,
    pub notes: Option<String>,
}

/// Asset check-out and check-in.
#[derive(Clone)]
pub struct CheckoutService {
    db_pool: Arc<DbPool>,
}

impl CheckoutService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: &CheckoutFilter) -> Result<Vec<asset_checkout::Model>, ServiceError> {
        let mut query = asset_checkout::Entity::find();
        if let Some(status) = filter.status {
            query = query.filter(asset_checkout::Column::Status.eq(status));
        }
        if let Some(asset_id) = filter.asset_id {
            query = query.filter(asset_checkout::Column::AssetId.eq(asset_id));
        }
        Ok(query
            .order_by_desc(asset_checkout::Column::CheckoutDate)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<asset_checkout::Model, ServiceError> {
        asset_checkout::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Checkout", id))
    }

    /// Checks an asset out. An asset holds at most one open checkout.
    #[instrument(skip(self, input), fields(asset_id = %input.asset_id))]
    pub async fn create(&self, input: CreateCheckoutInput) -> Result<asset_checkout::Model, ServiceError> {
        let db = &*self.db_pool;

        let asset = asset::Entity::find_by_id(input.asset_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Asset", input.asset_id))?;

        let open = asset_checkout::Entity::find()
            .filter(asset_checkout::Column::AssetId.eq(asset.id))
            .filter(asset_checkout::Column::Status.eq(CheckoutStatus::Out))
            .count(db)
            .await?;
        if open > 0 {
            return Err(ServiceError::Conflict(format!(
                "asset {} is already checked out",
                asset.no_asset
            )));
        }

        let employee = match input.employee_id {
            Some(id) => Some(
                employee::Entity::find_by_id(id)
                    .one(db)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Employee", id))?,
            ),
            None => None,
        };

        let assigned_to = input
            .assigned_to
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| employee.as_ref().map(|e| e.name.clone()))
            .ok_or_else(|| {
                ServiceError::ValidationError("assigned_to or employee_id is required".into())
            })?;

        let checkout = asset_checkout::ActiveModel {
            id: Set(Uuid::new_v4()),
            asset_id: Set(asset.id),
            employee_id: Set(input.employee_id),
            assigned_to: Set(assigned_to),
            checkout_date: Set(input.checkout_date.unwrap_or_else(Utc::now)),
            due_date: Set(input.due_date),
            return_date: Set(None),
            checkout_signature: Set(input.checkout_signature),
            return_signature: Set(None),
            notes: Set(input.notes),
            status: Set(CheckoutStatus::Out),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(checkout_id = %checkout.id, no_asset = %asset.no_asset, "asset checked out");
        Ok(checkout)
    }

    #[instrument(skip(self, input))]
    pub async fn check_in(&self, id: Uuid, input: CheckInInput) -> Result<asset_checkout::Model, ServiceError> {
        let checkout = self.get(id).await?;
        if checkout.status == CheckoutStatus::Returned {
            return Err(ServiceError::InvalidOperation(
                "checkout has already been returned".into(),
            ));
        }

        let mut active = checkout.into_active_model();
        active.status = Set(CheckoutStatus::Returned);
        active.return_date = Set(Some(input.return_date.unwrap_or_else(Utc::now)));
        if input.return_signature.is_some() {
            active.return_signature = Set(input.return_signature);
        }
        if input.notes.is_some() {
            active.notes = Set(input.notes);
        }

        let checkout = active.update(&*self.db_pool).await?;
        info!(checkout_id = %id, "asset checked in");
        Ok(checkout)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get(id).await?;
        asset_checkout::Entity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await?;
        Ok(())
    }
}
