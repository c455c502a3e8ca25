//! Stock opname sessions: admin lifecycle plus the scanning workflow.
//!
//! Entries stage edits in their `temp_*` fields. Nothing touches the asset
//! table until [`SoSessionService::complete`] copies the identified entries
//! over in one transaction.

use chrono::Utc;
use sea_orm::{
    error::SqlErr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, Iterable,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{with_transaction, DbPool},
    entities::{asset, so_asset_entry, so_session, AssetStatus, SessionStatus},
    errors::ServiceError,
};

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateSessionInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(range(min = 1900, max = 9999))]
    pub year: i32,
    pub description: Option<String>,
}

/// Identifies the scanned asset by number or id; the number wins when both
/// are present.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ScanRequest {
    pub no_asset: Option<String>,
    pub asset_id: Option<Uuid>,
}

/// Staged edits for one entry. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEntryInput {
    pub is_identified: Option<bool>,
    #[validate(length(min = 1, max = 255))]
    pub temp_name: Option<String>,
    pub temp_status: Option<AssetStatus>,
    pub temp_serial_no: Option<String>,
    pub temp_pic: Option<String>,
    pub temp_pic_id: Option<Uuid>,
    pub temp_notes: Option<String>,
    pub temp_brand: Option<String>,
    pub temp_model: Option<String>,
    pub temp_site_id: Option<Uuid>,
    pub temp_category_id: Option<Uuid>,
    pub temp_department_id: Option<Uuid>,
    pub temp_image_url: Option<String>,
}

/// Entry with its asset joined in.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EntryWithAsset {
    #[serde(flatten)]
    pub entry: so_asset_entry::Model,
    pub asset: Option<asset::Model>,
}

/// Outcome of a scan; `created` is false when the asset was already scanned.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub entry: so_asset_entry::Model,
    pub created: bool,
}

#[derive(Clone)]
pub struct SoSessionService {
    db_pool: Arc<DbPool>,
}

impl SoSessionService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: &SessionFilter) -> Result<Vec<so_session::Model>, ServiceError> {
        let mut query = so_session::Entity::find();
        if let Some(status) = filter.status {
            query = query.filter(so_session::Column::Status.eq(status));
        }
        if let Some(year) = filter.year {
            query = query.filter(so_session::Column::Year.eq(year));
        }
        Ok(query
            .order_by_desc(so_session::Column::StartedAt)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<so_session::Model, ServiceError> {
        load_session(&*self.db_pool, id).await
    }

    /// Opens a session. The expected total counts every asset that is not
    /// disposed or sold.
    #[instrument(skip(self, input), fields(name = %input.name, year = input.year))]
    pub async fn create(
        &self,
        input: CreateSessionInput,
        created_by: Option<Uuid>,
    ) -> Result<so_session::Model, ServiceError> {
        let db = &*self.db_pool;
        let countable: Vec<AssetStatus> =
            AssetStatus::iter().filter(|s| s.is_countable()).collect();
        let total = asset::Entity::find()
            .filter(asset::Column::Status.is_in(countable))
            .count(db)
            .await?;

        let now = Utc::now();
        let session = so_session::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            year: Set(input.year),
            description: Set(input.description),
            status: Set(SessionStatus::Active),
            total_assets: Set(total as i32),
            scanned_assets: Set(0),
            verified_assets: Set(0),
            started_at: Set(now),
            completed_at: Set(None),
            created_by: Set(created_by),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(session_id = %session.id, total_assets = total, "stock opname session started");
        Ok(session)
    }

    /// Entries go with the session. Completed sessions are kept.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let session = self.get(id).await?;
        if session.status == SessionStatus::Completed {
            return Err(ServiceError::InvalidOperation(
                "completed sessions cannot be deleted".into(),
            ));
        }

        with_transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                so_asset_entry::Entity::delete_many()
                    .filter(so_asset_entry::Column::SoSessionId.eq(id))
                    .exec(txn)
                    .await?;
                so_session::Entity::delete_by_id(id).exec(txn).await?;
                Ok(())
            })
        })
        .await?;

        info!(session_id = %id, "stock opname session deleted");
        Ok(())
    }

    /// Copies identified entries onto their assets and closes the session.
    #[instrument(skip(self))]
    pub async fn complete(&self, id: Uuid) -> Result<so_session::Model, ServiceError> {
        let (session, applied) = with_transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let session = load_session(txn, id).await?;
                ensure_active(&session)?;

                let identified = so_asset_entry::Entity::find()
                    .filter(so_asset_entry::Column::SoSessionId.eq(id))
                    .filter(so_asset_entry::Column::IsIdentified.eq(true))
                    .find_also_related(asset::Entity)
                    .all(txn)
                    .await?;

                let mut applied = 0usize;
                for (entry, asset) in identified {
                    let Some(asset) = asset else {
                        continue;
                    };
                    let mut active = asset.into_active_model();
                    if apply_temp_fields(&mut active, &entry) {
                        active.update(txn).await?;
                        applied += 1;
                    }
                }

                let mut active = session.into_active_model();
                active.status = Set(SessionStatus::Completed);
                active.completed_at = Set(Some(Utc::now()));
                let session = active.update(txn).await?;
                Ok((session, applied))
            })
        })
        .await?;

        info!(session_id = %id, assets_updated = applied, "stock opname session completed");
        Ok(session)
    }

    /// Discards every entry; assets are not modified.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid) -> Result<so_session::Model, ServiceError> {
        let (session, discarded) = with_transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let session = load_session(txn, id).await?;
                ensure_active(&session)?;

                let discarded = so_asset_entry::Entity::delete_many()
                    .filter(so_asset_entry::Column::SoSessionId.eq(id))
                    .exec(txn)
                    .await?
                    .rows_affected;

                let mut active = session.into_active_model();
                active.status = Set(SessionStatus::Cancelled);
                active.scanned_assets = Set(0);
                active.verified_assets = Set(0);
                let session = active.update(txn).await?;
                Ok((session, discarded))
            })
        })
        .await?;

        info!(session_id = %id, entries_discarded = discarded, "stock opname session cancelled");
        Ok(session)
    }

    /// Records a scan. Scanning the same asset twice returns the first entry.
    #[instrument(skip(self))]
    pub async fn scan(
        &self,
        session_id: Uuid,
        request: ScanRequest,
        scanned_by: Option<Uuid>,
    ) -> Result<ScanOutcome, ServiceError> {
        let db = &*self.db_pool;
        let session = self.get(session_id).await?;
        ensure_active(&session)?;

        let asset = match (
            request.no_asset.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            request.asset_id,
        ) {
            (Some(number), _) => asset::Entity::find()
                .filter(asset::Column::NoAsset.eq(number))
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Asset {}", number)))?,
            (None, Some(asset_id)) => asset::Entity::find_by_id(asset_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::not_found("Asset", asset_id))?,
            (None, None) => {
                return Err(ServiceError::ValidationError(
                    "either no_asset or asset_id is required".into(),
                ))
            }
        };

        if let Some(entry) = find_entry(db, session_id, asset.id).await? {
            debug!(entry_id = %entry.id, "asset already scanned in this session");
            return Ok(ScanOutcome {
                entry,
                created: false,
            });
        }

        let entry = match snapshot_entry(session_id, &asset, scanned_by).insert(db).await {
            Ok(entry) => entry,
            // A concurrent scan of the same asset won the insert
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                let entry = find_entry(db, session_id, asset.id)
                    .await?
                    .ok_or(ServiceError::DatabaseError(err))?;
                debug!(entry_id = %entry.id, "asset scanned concurrently in this session");
                return Ok(ScanOutcome {
                    entry,
                    created: false,
                });
            }
            Err(err) => return Err(err.into()),
        };
        refresh_counts(db, session_id).await?;

        info!(session_id = %session_id, no_asset = %asset.no_asset, "asset scanned");
        Ok(ScanOutcome {
            entry,
            created: true,
        })
    }

    #[instrument(skip(self))]
    pub async fn entries(&self, session_id: Uuid) -> Result<Vec<EntryWithAsset>, ServiceError> {
        let db = &*self.db_pool;
        self.get(session_id).await?;
        Ok(so_asset_entry::Entity::find()
            .filter(so_asset_entry::Column::SoSessionId.eq(session_id))
            .order_by_desc(so_asset_entry::Column::ScannedAt)
            .find_also_related(asset::Entity)
            .all(db)
            .await?
            .into_iter()
            .map(|(entry, asset)| EntryWithAsset { entry, asset })
            .collect())
    }

    #[instrument(skip(self, input))]
    pub async fn update_entry(
        &self,
        session_id: Uuid,
        entry_id: Uuid,
        input: UpdateEntryInput,
    ) -> Result<so_asset_entry::Model, ServiceError> {
        let db = &*self.db_pool;
        let session = self.get(session_id).await?;
        ensure_active(&session)?;
        let entry = load_entry(db, session_id, entry_id).await?;

        let mut active = entry.into_active_model();
        if let Some(v) = input.is_identified {
            active.is_identified = Set(v);
        }
        if input.temp_name.is_some() {
            active.temp_name = Set(input.temp_name);
        }
        if input.temp_status.is_some() {
            active.temp_status = Set(input.temp_status);
        }
        if input.temp_serial_no.is_some() {
            active.temp_serial_no = Set(input.temp_serial_no);
        }
        if input.temp_pic.is_some() {
            active.temp_pic = Set(input.temp_pic);
        }
        if input.temp_pic_id.is_some() {
            active.temp_pic_id = Set(input.temp_pic_id);
        }
        if input.temp_notes.is_some() {
            active.temp_notes = Set(input.temp_notes);
        }
        if input.temp_brand.is_some() {
            active.temp_brand = Set(input.temp_brand);
        }
        if input.temp_model.is_some() {
            active.temp_model = Set(input.temp_model);
        }
        if input.temp_site_id.is_some() {
            active.temp_site_id = Set(input.temp_site_id);
        }
        if input.temp_category_id.is_some() {
            active.temp_category_id = Set(input.temp_category_id);
        }
        if input.temp_department_id.is_some() {
            active.temp_department_id = Set(input.temp_department_id);
        }
        if input.temp_image_url.is_some() {
            active.temp_image_url = Set(input.temp_image_url);
        }

        let entry = active.update(db).await?;
        refresh_counts(db, session_id).await?;
        Ok(entry)
    }

    #[instrument(skip(self))]
    pub async fn remove_entry(&self, session_id: Uuid, entry_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let session = self.get(session_id).await?;
        ensure_active(&session)?;
        load_entry(db, session_id, entry_id).await?;

        so_asset_entry::Entity::delete_by_id(entry_id).exec(db).await?;
        refresh_counts(db, session_id).await?;
        Ok(())
    }
}

async fn load_session<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<so_session::Model, ServiceError> {
    so_session::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Session", id))
}

async fn load_entry<C: ConnectionTrait>(
    conn: &C,
    session_id: Uuid,
    entry_id: Uuid,
) -> Result<so_asset_entry::Model, ServiceError> {
    so_asset_entry::Entity::find_by_id(entry_id)
        .filter(so_asset_entry::Column::SoSessionId.eq(session_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Entry", entry_id))
}

async fn find_entry<C: ConnectionTrait>(
    conn: &C,
    session_id: Uuid,
    asset_id: Uuid,
) -> Result<Option<so_asset_entry::Model>, DbErr> {
    so_asset_entry::Entity::find()
        .filter(so_asset_entry::Column::SoSessionId.eq(session_id))
        .filter(so_asset_entry::Column::AssetId.eq(asset_id))
        .one(conn)
        .await
}

fn ensure_active(session: &so_session::Model) -> Result<(), ServiceError> {
    if session.is_active() {
        Ok(())
    } else {
        Err(ServiceError::InvalidOperation(format!(
            "session is {} and can no longer change",
            session.status
        )))
    }
}

/// `scanned_assets` = entries, `verified_assets` = identified entries.
async fn refresh_counts<C: ConnectionTrait>(conn: &C, session_id: Uuid) -> Result<(), ServiceError> {
    let scanned = so_asset_entry::Entity::find()
        .filter(so_asset_entry::Column::SoSessionId.eq(session_id))
        .count(conn)
        .await?;
    let verified = so_asset_entry::Entity::find()
        .filter(so_asset_entry::Column::SoSessionId.eq(session_id))
        .filter(so_asset_entry::Column::IsIdentified.eq(true))
        .count(conn)
        .await?;

    so_session::ActiveModel {
        id: Set(session_id),
        scanned_assets: Set(scanned as i32),
        verified_assets: Set(verified as i32),
        ..Default::default()
    }
    .update(conn)
    .await?;
    Ok(())
}

/// New entry whose temp fields start as a copy of the asset.
fn snapshot_entry(
    session_id: Uuid,
    asset: &asset::Model,
    scanned_by: Option<Uuid>,
) -> so_asset_entry::ActiveModel {
    so_asset_entry::ActiveModel {
        id: Set(Uuid::new_v4()),
        so_session_id: Set(session_id),
        asset_id: Set(asset.id),
        scanned_at: Set(Utc::now()),
        scanned_by: Set(scanned_by),
        is_identified: Set(false),
        temp_name: Set(Some(asset.name.clone())),
        temp_status: Set(Some(asset.status)),
        temp_serial_no: Set(asset.serial_no.clone()),
        temp_pic: Set(asset.pic.clone()),
        temp_pic_id: Set(asset.pic_id),
        temp_notes: Set(asset.notes.clone()),
        temp_brand: Set(asset.brand.clone()),
        temp_model: Set(asset.model.clone()),
        temp_site_id: Set(asset.site_id),
        temp_category_id: Set(asset.category_id),
        temp_department_id: Set(asset.department_id),
        temp_image_url: Set(asset.image_url.clone()),
        ..Default::default()
    }
}

/// Copies every present temp field. Returns whether anything was set.
fn apply_temp_fields(target: &mut asset::ActiveModel, entry: &so_asset_entry::Model) -> bool {
    let mut changed = false;
    if let Some(v) = &entry.temp_name {
        target.name = Set(v.clone());
        changed = true;
    }
    if let Some(v) = entry.temp_status {
        target.status = Set(v);
        changed = true;
    }
    if let Some(v) = &entry.temp_serial_no {
        target.serial_no = Set(Some(v.clone()));
        changed = true;
    }
    if let Some(v) = &entry.temp_pic {
        target.pic = Set(Some(v.clone()));
        changed = true;
    }
    if let Some(v) = entry.temp_pic_id {
        target.pic_id = Set(Some(v));
        changed = true;
    }
    if let Some(v) = &entry.temp_notes {
        target.notes = Set(Some(v.clone()));
        changed = true;
    }
    if let Some(v) = &entry.temp_brand {
        target.brand = Set(Some(v.clone()));
        changed = true;
    }
    if let Some(v) = &entry.temp_model {
        target.model = Set(Some(v.clone()));
        changed = true;
    }
    if let Some(v) = entry.temp_site_id {
        target.site_id = Set(Some(v));
        changed = true;
    }
    if let Some(v) = entry.temp_category_id {
        target.category_id = Set(Some(v));
        changed = true;
    }
    if let Some(v) = entry.temp_department_id {
        target.department_id = Set(Some(v));
        changed = true;
    }
    if let Some(v) = &entry.temp_image_url {
        target.image_url = Set(Some(v.clone()));
        changed = true;
    }
    changed
}
