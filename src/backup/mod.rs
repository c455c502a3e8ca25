/*!
 * # Backup Module
 *
 * Export dumps every table into a zip (`database.json` + `metadata.json`).
 * Import replays such a zip through a restore engine:
 *
 * - [`sql_engine::SqlEngine`] writes to the service database in one transaction
 * - [`remote_engine::RemoteEngine`] writes to a PostgREST-style table store
 *
 * The preferred engine is picked from configuration; the other one is tried
 * only when the preferred engine fails outright.
 */

use axum::http::StatusCode;
use chrono::Utc;
use sea_orm::EntityTrait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

pub mod archive;
pub mod engine;
pub mod plan;
pub mod remote_engine;
pub mod sql_engine;
pub mod transform;

pub use archive::{BackupArchive, BackupMetadata};
pub use engine::{
    engine_order, restore_with_fallback, EngineKind, PreparedRestore, RestoreEngine,
    RestoreReport, TableReport,
};

use crate::config::{AppConfig, BackupPreference};
use crate::db::DbPool;
use crate::entities::{
    asset, asset_checkout, category, department, employee, site, so_asset_entry, so_session, user,
};
use crate::errors::ServiceError;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("invalid archive: {0}")]
    Archive(String),

    #[error("archive must contain database.json and metadata.json at the root or in one folder")]
    MissingFiles,

    #[error("invalid backup JSON: {0}")]
    InvalidJson(String),

    #[error("missing required field '{field}' in table '{table}'")]
    MissingField { table: String, field: String },

    #[error("invalid value for '{field}' in table '{table}': {message}")]
    InvalidValue {
        table: String,
        field: String,
        message: String,
    },

    #[error("restore engine error: {0}")]
    Engine(String),

    #[error("all restore engines failed: {0}")]
    AllEnginesFailed(String),

    #[error("no restore engine is configured")]
    NoEngine,

    #[error("'{name}' is larger than the {limit} byte limit")]
    EntryTooLarge { name: String, limit: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackupError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Archive(_) | Self::MissingFiles | Self::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Self::MissingField { .. } | Self::InvalidValue { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::EntryTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Engine(_) | Self::AllEnginesFailed(_) => StatusCode::BAD_GATEWAY,
            Self::NoEngine | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Backup settings lifted out of [`AppConfig`].
#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub database_url: String,
    pub prefer: BackupPreference,
    pub remote_url: Option<String>,
    pub remote_key: Option<String>,
    pub batch_size: usize,
    pub remote_timeout: Duration,
    /// Largest uncompressed archive entry that will be read
    pub max_entry_bytes: u64,
}

impl From<&AppConfig> for BackupSettings {
    fn from(cfg: &AppConfig) -> Self {
        let (remote_url, remote_key) = match cfg.remote_backup_target() {
            Some((url, key)) => (Some(url.to_string()), Some(key.to_string())),
            None => (None, None),
        };
        Self {
            database_url: cfg.database_url.clone(),
            prefer: cfg.backup_prefer,
            remote_url,
            remote_key,
            batch_size: cfg.backup_batch_size,
            remote_timeout: Duration::from_secs(cfg.backup_remote_timeout_secs),
            max_entry_bytes: cfg.backup_max_entry_bytes,
        }
    }
}

fn to_values<T: Serialize>(rows: Vec<T>) -> Result<Vec<Value>, ServiceError> {
    rows.into_iter()
        .map(|r| serde_json::to_value(r).map_err(ServiceError::from))
        .collect()
}

/// Normalizes dump keys, transforms every table and computes the order.
pub fn prepare(archive: &BackupArchive) -> Result<PreparedRestore, BackupError> {
    let mut raw: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for (key, rows) in &archive.database {
        let Value::Array(rows) = rows else {
            return Err(BackupError::InvalidJson(format!(
                "table '{}' must be an array of rows",
                key
            )));
        };
        raw.entry(plan::normalize_table_name(key))
            .or_default()
            .extend(rows.iter().cloned());
    }

    let order = plan::restore_order(
        archive.metadata.tables.as_deref(),
        raw.keys().map(String::as_str),
    );

    let mut tables = BTreeMap::new();
    for (name, rows) in &raw {
        tables.insert(name.clone(), transform::transform_table(name, rows)?);
    }
    Ok(PreparedRestore { order, tables })
}

/// Export and restore of the whole dataset.
#[derive(Clone)]
pub struct BackupService {
    db_pool: Arc<DbPool>,
    settings: BackupSettings,
}

impl BackupService {
    pub fn new(db_pool: Arc<DbPool>, settings: BackupSettings) -> Self {
        Self { db_pool, settings }
    }

    /// Every known table in restore order.
    #[instrument(skip(self))]
    pub async fn snapshot(&self) -> Result<BackupArchive, ServiceError> {
        let db = &*self.db_pool;
        let mut database = Map::new();
        for table in plan::DEFAULT_ORDER {
            let rows = match table {
                "sites" => to_values(site::Entity::find().all(db).await?)?,
                "categories" => to_values(category::Entity::find().all(db).await?)?,
                "departments" => to_values(department::Entity::find().all(db).await?)?,
                "employees" => to_values(employee::Entity::find().all(db).await?)?,
                "users" => to_values(user::Entity::find().all(db).await?)?,
                "assets" => to_values(asset::Entity::find().all(db).await?)?,
                "so_sessions" => to_values(so_session::Entity::find().all(db).await?)?,
                "so_asset_entries" => to_values(so_asset_entry::Entity::find().all(db).await?)?,
                "asset_checkouts" => to_values(asset_checkout::Entity::find().all(db).await?)?,
                _ => Vec::new(),
            };
            database.insert(table.to_string(), Value::Array(rows));
        }

        Ok(BackupArchive {
            database,
            metadata: BackupMetadata {
                exported_at: Some(Utc::now()),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
                tables: Some(plan::DEFAULT_ORDER.iter().map(|t| t.to_string()).collect()),
            },
        })
    }

    /// Zip archive bytes of [`Self::snapshot`].
    #[instrument(skip(self))]
    pub async fn export(&self) -> Result<Vec<u8>, ServiceError> {
        let snapshot = self.snapshot().await?;
        let bytes = tokio::task::spawn_blocking(move || archive::write_archive(&snapshot))
            .await
            .map_err(|e| ServiceError::InternalError(format!("export task failed: {}", e)))??;
        info!(bytes = bytes.len(), "backup exported");
        Ok(bytes)
    }

    /// Restores a zip archive.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn import(&self, bytes: Vec<u8>) -> Result<RestoreReport, ServiceError> {
        let limit = self.settings.max_entry_bytes;
        let archive = tokio::task::spawn_blocking(move || archive::read_archive(&bytes, limit))
            .await
            .map_err(|e| ServiceError::InternalError(format!("import task failed: {}", e)))??;
        self.restore(&archive).await
    }

    #[instrument(skip(self, archive))]
    pub async fn restore(&self, archive: &BackupArchive) -> Result<RestoreReport, ServiceError> {
        let prepared = prepare(archive)?;
        let engines = self.engines()?;
        Ok(restore_with_fallback(&engines, &prepared).await?)
    }

    fn engines(&self) -> Result<Vec<Arc<dyn RestoreEngine>>, BackupError> {
        let remote = self.settings.remote_url.as_deref().zip(self.settings.remote_key.as_deref());
        engine_order(
            self.settings.prefer,
            &self.settings.database_url,
            remote.is_some(),
        )
        .into_iter()
        .map(|kind| -> Result<Arc<dyn RestoreEngine>, BackupError> {
            match (kind, remote) {
                (EngineKind::Remote, Some((url, key))) => Ok(Arc::new(remote_engine::RemoteEngine::new(
                    url,
                    key,
                    self.settings.batch_size,
                    self.settings.remote_timeout,
                )?)),
                _ => Ok(Arc::new(sql_engine::SqlEngine::new(
                    self.db_pool.clone(),
                    self.settings.batch_size,
                ))),
            }
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prepare_merges_key_variants_and_orders_tables() {
        let mut database = Map::new();
        database.insert("Sites".into(), json!([{"id": 1, "name": "A"}]));
        database.insert("sites".into(), json!([{"id": 2, "name": "B"}]));
        database.insert("soSessions".into(), json!([]));
        let archive = BackupArchive {
            database,
            metadata: BackupMetadata {
                tables: Some(vec!["assets".into(), "sites".into()]),
                ..Default::default()
            },
        };

        let prepared = prepare(&archive).unwrap();
        assert_eq!(prepared.tables["sites"].len(), 2);
        assert!(prepared.tables.contains_key("so_sessions"));
        let pos = |t: &str| prepared.order.iter().position(|o| o == t).unwrap();
        assert!(pos("sites") < pos("assets"));
    }

    #[test]
    fn non_array_tables_are_rejected() {
        let mut database = Map::new();
        database.insert("sites".into(), json!({"id": 1}));
        let archive = BackupArchive {
            database,
            metadata: BackupMetadata::default(),
        };
        assert!(matches!(prepare(&archive), Err(BackupError::InvalidJson(_))));
    }

    #[test]
    fn data_errors_are_422_engine_errors_502() {
        assert_eq!(
            BackupError::MissingField {
                table: "assets".into(),
                field: "name".into()
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            BackupError::AllEnginesFailed("sql: x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(BackupError::MissingFiles.status_code(), StatusCode::BAD_REQUEST);
    }
}
