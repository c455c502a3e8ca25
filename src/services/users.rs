use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{hash_password, verify_password, AuthError, AuthService, AuthUser, Capabilities, TokenResponse},
    db::DbPool,
    entities::{user, UserRole},
    errors::ServiceError,
};

/// User as returned by the API; the password hash never leaves the service.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            role: u.role,
            is_active: u.is_active,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// `/api/auth/me` body: profile plus the UI capability flags.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUserInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub role: UserRole,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    /// Resets the password when present
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User accounts and login.
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>, auth: Arc<AuthService>) -> Self {
        Self { db_pool, auth }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<UserResponse>, ServiceError> {
        Ok(user::Entity::find()
            .order_by_asc(user::Column::Email)
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(UserResponse::from)
            .collect())
    }

    async fn find(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<UserResponse, ServiceError> {
        self.find(id).await.map(UserResponse::from)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self, input), fields(email = %input.email, role = %input.role))]
    pub async fn create(&self, input: CreateUserInput) -> Result<UserResponse, ServiceError> {
        let email = normalize_email(&input.email);
        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(format!("user {} already exists", email)));
        }

        let password_hash = hash_password(&input.password)?;
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            name: Set(input.name.trim().to_string()),
            password_hash: Set(password_hash),
            role: Set(input.role),
            is_active: Set(input.is_active.unwrap_or(true)),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(user_id = %model.id, role = %model.role, "user created");
        Ok(model.into())
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: UpdateUserInput) -> Result<UserResponse, ServiceError> {
        let mut active = self.find(id).await?.into_active_model();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(role) = input.role {
            active.role = Set(role);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(password) = input.password {
            active.password_hash = Set(hash_password(&password)?);
            info!(user_id = %id, "password reset");
        }
        Ok(active.update(&*self.db_pool).await?.into())
    }

    /// Deletes a user. Nobody may delete their own account.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn delete(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        if actor.user_id == id {
            return Err(ServiceError::InvalidOperation(
                "you cannot delete your own account".into(),
            ));
        }
        self.find(id).await?;
        user::Entity::delete_by_id(id).exec(&*self.db_pool).await?;
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    /// Checks credentials and issues a token. Unknown email, wrong password
    /// and deactivated accounts all read as invalid credentials.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<TokenResponse, ServiceError> {
        let Some(account) = self.find_by_email(&request.email).await? else {
            warn!("login for unknown email");
            return Err(AuthError::InvalidCredentials.into());
        };
        if !account.is_active || !verify_password(&request.password, &account.password_hash) {
            warn!(user_id = %account.id, "login rejected");
            return Err(AuthError::InvalidCredentials.into());
        }
        Ok(self.auth.generate_token(&account)?)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn me(&self, actor: &AuthUser) -> Result<MeResponse, ServiceError> {
        let account = self.find(actor.user_id).await?;
        if !account.is_active {
            return Err(AuthError::InvalidToken.into());
        }
        let capabilities = crate::auth::capabilities(account.role);
        Ok(MeResponse {
            user: account.into(),
            capabilities,
        })
    }

    /// Creates the account or, when the email exists, promotes it to an
    /// active admin with the new password. Used by the CLI bootstrap.
    #[instrument(skip(self, password))]
    pub async fn ensure_admin(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<UserResponse, ServiceError> {
        match self.find_by_email(email).await? {
            Some(existing) => {
                self.update(
                    existing.id,
                    UpdateUserInput {
                        name: Some(name.to_string()),
                        role: Some(UserRole::Admin),
                        is_active: Some(true),
                        password: Some(password.to_string()),
                    },
                )
                .await
            }
            None => {
                self.create(CreateUserInput {
                    email: email.to_string(),
                    name: name.to_string(),
                    password: password.to_string(),
                    role: UserRole::Admin,
                    is_active: Some(true),
                })
                .await
            }
        }
    }

    pub async fn count(&self) -> Result<u64, ServiceError> {
        Ok(user::Entity::find().count(&*self.db_pool).await?)
    }
}
