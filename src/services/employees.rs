use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, IntoActiveModel, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{asset, employee},
    errors::ServiceError,
};

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeFilter {
    /// Matches name, employee code or email
    pub search: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateEmployeeInput {
    #[validate(length(min = 1, max = 64))]
    pub employee_code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateEmployeeInput {
    #[validate(length(min = 1, max = 64))]
    pub employee_code: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub is_active: Option<bool>,
}

/// An employee together with the assets they are PIC of.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EmployeeDetail {
    #[serde(flatten)]
    pub employee: employee::Model,
    pub assets: Vec<asset::Model>,
}

/// Service for managing employees
#[derive(Clone)]
pub struct EmployeeService {
    db_pool: Arc<DbPool>,
}

impl EmployeeService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: &EmployeeFilter) -> Result<Vec<employee::Model>, ServiceError> {
        let mut query = employee::Entity::find();
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(employee::Column::Name.contains(search))
                    .add(employee::Column::EmployeeCode.contains(search))
                    .add(employee::Column::Email.contains(search)),
            );
        }
        if let Some(active) = filter.active {
            query = query.filter(employee::Column::IsActive.eq(active));
        }
        Ok(query
            .order_by_asc(employee::Column::Name)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<employee::Model, ServiceError> {
        employee::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Employee", id))
    }

    /// Employee plus linked assets.
    #[instrument(skip(self))]
    pub async fn get_detail(&self, id: Uuid) -> Result<EmployeeDetail, ServiceError> {
        let employee = self.get(id).await?;
        let assets = employee
            .find_related(asset::Entity)
            .order_by_asc(asset::Column::NoAsset)
            .all(&*self.db_pool)
            .await?;
        Ok(EmployeeDetail { employee, assets })
    }

    #[instrument(skip(self))]
    pub async fn find_by_code(&self, code: &str) -> Result<Option<employee::Model>, ServiceError> {
        Ok(employee::Entity::find()
            .filter(employee::Column::EmployeeCode.eq(code.trim()))
            .one(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self, input), fields(code = %input.employee_code))]
    pub async fn create(&self, input: CreateEmployeeInput) -> Result<employee::Model, ServiceError> {
        let code = input.employee_code.trim().to_string();
        if self.find_by_code(&code).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "employee code {} already exists",
                code
            )));
        }

        let model = employee::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_code: Set(code),
            name: Set(input.name.trim().to_string()),
            email: Set(input.email),
            phone: Set(input.phone),
            department: Set(input.department),
            position: Set(input.position),
            is_active: Set(input.is_active.unwrap_or(true)),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(employee_id = %model.id, "employee created");
        Ok(model)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateEmployeeInput,
    ) -> Result<employee::Model, ServiceError> {
        let existing = self.get(id).await?;

        if let Some(code) = input.employee_code.as_deref().map(str::trim) {
            if code != existing.employee_code {
                if let Some(other) = self.find_by_code(code).await? {
                    if other.id != id {
                        return Err(ServiceError::Conflict(format!(
                            "employee code {} already exists",
                            code
                        )));
                    }
                }
            }
        }

        let mut active = existing.into_active_model();
        if let Some(v) = input.employee_code {
            active.employee_code = Set(v.trim().to_string());
        }
        if let Some(v) = input.name {
            active.name = Set(v.trim().to_string());
        }
        if input.email.is_some() {
            active.email = Set(input.email);
        }
        if input.phone.is_some() {
            active.phone = Set(input.phone);
        }
        if input.department.is_some() {
            active.department = Set(input.department);
        }
        if input.position.is_some() {
            active.position = Set(input.position);
        }
        if let Some(v) = input.is_active {
            active.is_active = Set(v);
        }

        Ok(active.update(&*self.db_pool).await?)
    }

    /// Deletes an employee who is not PIC of any asset.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let existing = self.get(id).await?;

        let linked = asset::Entity::find()
            .filter(asset::Column::PicId.eq(id))
            .count(db)
            .await?;
        if linked > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "employee {} is PIC of {} asset(s)",
                existing.employee_code, linked
            )));
        }

        employee::Entity::delete_by_id(id).exec(db).await?;
        info!(employee_id = %id, "employee deleted");
        Ok(())
    }

    /// Inserts or updates by employee code. Returns true when a row was created.
    #[instrument(skip(self, input), fields(code = %input.employee_code))]
    pub async fn upsert_by_code(&self, input: CreateEmployeeInput) -> Result<bool, ServiceError> {
        match self.find_by_code(&input.employee_code).await? {
            Some(existing) => {
                self.update(
                    existing.id,
                    UpdateEmployeeInput {
                        employee_code: None,
                        name: Some(input.name),
                        email: input.email,
                        phone: input.phone,
                        department: input.department,
                        position: input.position,
                        is_active: input.is_active,
                    },
                )
                .await?;
                Ok(false)
            }
            None => {
                self.create(input).await?;
                Ok(true)
            }
        }
    }
}
