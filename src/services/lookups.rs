//! Sites, categories and departments share one shape (`name`, `sort_order`)
//! and one set of operations, dispatched on [`LookupKind`].

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{with_transaction, DbPool},
    entities::asset,
    errors::ServiceError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum LookupKind {
    #[strum(serialize = "Site")]
    Site,
    #[strum(serialize = "Category")]
    Category,
    #[strum(serialize = "Department")]
    Department,
}

impl LookupKind {
    /// Column on `assets` that references this lookup.
    fn asset_column(self) -> asset::Column {
        match self {
            LookupKind::Site => asset::Column::SiteId,
            LookupKind::Category => asset::Column::CategoryId,
            LookupKind::Department => asset::Column::DepartmentId,
        }
    }
}

/// Runs `$body` with `$m` bound to the entity module for `$kind`.
macro_rules! with_lookup {
    ($kind:expr, $m:ident => $body:expr) => {
        match $kind {
            LookupKind::Site => {
                use crate::entities::site as $m;
                $body
            }
            LookupKind::Category => {
                use crate::entities::category as $m;
                $body
            }
            LookupKind::Department => {
                use crate::entities::department as $m;
                $body
            }
        }
    };
}

macro_rules! to_item {
    ($model:expr) => {{
        let m = $model;
        LookupItem {
            id: m.id,
            name: m.name,
            sort_order: m.sort_order,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }};
}

/// A site, category or department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LookupItem {
    pub id: Uuid,
    pub name: String,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateLookupInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateLookupInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(range(min = 1))]
    pub sort_order: Option<i32>,
}

/// New display order: the first id gets `sort_order` 1.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ReorderInput {
    #[validate(length(min = 1))]
    pub ids: Vec<Uuid>,
}

#[derive(Clone)]
pub struct LookupService {
    db_pool: Arc<DbPool>,
}

impl LookupService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Ordered by `sort_order`, then name.
    #[instrument(skip(self))]
    pub async fn list(&self, kind: LookupKind) -> Result<Vec<LookupItem>, ServiceError> {
        let db = &*self.db_pool;
        with_lookup!(kind, m => {
            Ok(m::Entity::find()
                .order_by_asc(m::Column::SortOrder)
                .order_by_asc(m::Column::Name)
                .all(db)
                .await?
                .into_iter()
                .map(|row| to_item!(row))
                .collect())
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, kind: LookupKind, id: Uuid) -> Result<LookupItem, ServiceError> {
        let db = &*self.db_pool;
        with_lookup!(kind, m => {
            m::Entity::find_by_id(id)
                .one(db)
                .await?
                .map(|row| to_item!(row))
                .ok_or_else(|| ServiceError::not_found(&kind.to_string(), id))
        })
    }

    /// Appends at the end of the current order.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        kind: LookupKind,
        input: CreateLookupInput,
    ) -> Result<LookupItem, ServiceError> {
        let db = &*self.db_pool;
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::ValidationError("name must not be empty".into()));
        }
        self.ensure_name_free(kind, &name, None).await?;

        let item = with_lookup!(kind, m => {
            let max: Option<Option<i32>> = m::Entity::find()
                .select_only()
                .column_as(m::Column::SortOrder.max(), "max_order")
                .into_tuple()
                .one(db)
                .await?;
            let next = max.flatten().unwrap_or(0) + 1;
            let row = m::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(name),
                sort_order: Set(next),
                ..Default::default()
            }
            .insert(db)
            .await?;
            to_item!(row)
        });

        info!(kind = %kind, id = %item.id, sort_order = item.sort_order, "lookup created");
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        kind: LookupKind,
        id: Uuid,
        input: UpdateLookupInput,
    ) -> Result<LookupItem, ServiceError> {
        let db = &*self.db_pool;
        let name = input.name.map(|n| n.trim().to_string());
        if let Some(name) = name.as_deref() {
            if name.is_empty() {
                return Err(ServiceError::ValidationError("name must not be empty".into()));
            }
            self.ensure_name_free(kind, name, Some(id)).await?;
        }

        with_lookup!(kind, m => {
            let existing = m::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::not_found(&kind.to_string(), id))?;
            let mut active = existing.into_active_model();
            if let Some(name) = name {
                active.name = Set(name);
            }
            if let Some(order) = input.sort_order {
                active.sort_order = Set(order);
            }
            let row = active.update(db).await?;
            Ok(to_item!(row))
        })
    }

    /// Refused while any asset references the row.
    #[instrument(skip(self))]
    pub async fn delete(&self, kind: LookupKind, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let existing = self.get(kind, id).await?;

        let used = asset::Entity::find()
            .filter(kind.asset_column().eq(id))
            .count(db)
            .await?;
        if used > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "{} '{}' is used by {} asset(s)",
                kind, existing.name, used
            )));
        }

        with_lookup!(kind, m => {
            m::Entity::delete_by_id(id).exec(db).await?;
        });
        info!(kind = %kind, id = %id, "lookup deleted");
        Ok(())
    }

    /// Sets `sort_order = position + 1` for every id, atomically.
    #[instrument(skip(self, input), fields(count = input.ids.len()))]
    pub async fn reorder(
        &self,
        kind: LookupKind,
        input: ReorderInput,
    ) -> Result<Vec<LookupItem>, ServiceError> {
        let mut seen = HashSet::new();
        if let Some(dup) = input.ids.iter().find(|id| !seen.insert(**id)) {
            return Err(ServiceError::ValidationError(format!(
                "id {} appears more than once",
                dup
            )));
        }

        let ids = input.ids;
        with_transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                for (position, id) in ids.iter().enumerate() {
                    apply_order(txn, kind, *id, position as i32 + 1).await?;
                }
                Ok(())
            })
        })
        .await?;

        info!(kind = %kind, "lookup order saved");
        self.list(kind).await
    }

    async fn ensure_name_free(
        &self,
        kind: LookupKind,
        name: &str,
        except: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let taken = with_lookup!(kind, m => {
            let mut query = m::Entity::find().filter(m::Column::Name.eq(name));
            if let Some(id) = except {
                query = query.filter(m::Column::Id.ne(id));
            }
            query.count(db).await? > 0
        });
        if taken {
            return Err(ServiceError::Conflict(format!(
                "{} '{}' already exists",
                kind, name
            )));
        }
        Ok(())
    }
}

async fn apply_order<C: ConnectionTrait>(
    conn: &C,
    kind: LookupKind,
    id: Uuid,
    sort_order: i32,
) -> Result<(), ServiceError> {
    with_lookup!(kind, m => {
        let existing = m::Entity::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found(&kind.to_string(), id))?;
        let mut active = existing.into_active_model();
        active.sort_order = Set(sort_order);
        active.update(conn).await?;
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> LookupService {
        let db = crate::db::establish_connection("sqlite::memory:")
            .await
            .unwrap();
        crate::db::run_migrations(&db).await.unwrap();
        LookupService::new(Arc::new(db))
    }

    fn named(name: &str) -> CreateLookupInput {
        CreateLookupInput { name: name.into() }
    }

    #[tokio::test]
    async fn create_appends_and_reorder_renumbers() {
        let svc = service().await;
        let a = svc.create(LookupKind::Site, named("Jakarta")).await.unwrap();
        let b = svc.create(LookupKind::Site, named("Bandung")).await.unwrap();
        let c = svc.create(LookupKind::Site, named("Surabaya")).await.unwrap();
        assert_eq!((a.sort_order, b.sort_order, c.sort_order), (1, 2, 3));

        let ordered = svc
            .reorder(LookupKind::Site, ReorderInput { ids: vec![c.id, a.id, b.id] })
            .await
            .unwrap();
        let names: Vec<_> = ordered.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Surabaya", "Jakarta", "Bandung"]);
        assert_eq!(ordered[0].sort_order, 1);
    }

    #[tokio::test]
    async fn reorder_with_unknown_id_changes_nothing() {
        let svc = service().await;
        let a = svc.create(LookupKind::Category, named("IT")).await.unwrap();
        let b = svc.create(LookupKind::Category, named("Furniture")).await.unwrap();

        let err = svc
            .reorder(
                LookupKind::Category,
                ReorderInput { ids: vec![b.id, Uuid::new_v4(), a.id] },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let after = svc.list(LookupKind::Category).await.unwrap();
        assert_eq!(after[0].id, a.id);
        assert_eq!(after[0].sort_order, 1);
        assert_eq!(after[1].sort_order, 2);
    }

    #[tokio::test]
    async fn duplicate_names_conflict_per_table() {
        let svc = service().await;
        svc.create(LookupKind::Department, named("Finance")).await.unwrap();
        assert!(matches!(
            svc.create(LookupKind::Department, named(" Finance ")).await,
            Err(ServiceError::Conflict(_))
        ));
        svc.create(LookupKind::Site, named("Finance")).await.unwrap();
    }
}
