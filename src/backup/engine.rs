//! Restore engines and the fallback between them.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::transform::TableRows;
use super::BackupError;
use crate::config::BackupPreference;

/// Schemes the SQL engine can reach directly.
const DIRECT_SCHEMES: [&str; 3] = ["postgres", "postgresql", "sqlite"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EngineKind {
    Sql,
    Remote,
}

/// Archive contents after ordering and transformation.
#[derive(Debug, Clone, Default)]
pub struct PreparedRestore {
    /// Every table to restore, parents first
    pub order: Vec<String>,
    /// Transformed rows; tables in `order` without rows are emptied
    pub tables: BTreeMap<String, TableRows>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TableReport {
    pub table: String,
    pub inserted: u64,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TableReport {
    pub fn inserted(table: &str, inserted: u64) -> Self {
        Self {
            table: table.to_string(),
            inserted,
            skipped: false,
            reason: None,
        }
    }

    pub fn skipped(table: &str, reason: impl Into<String>) -> Self {
        Self {
            table: table.to_string(),
            inserted: 0,
            skipped: true,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RestoreReport {
    pub engine: EngineKind,
    pub tables: Vec<TableReport>,
    pub total: u64,
}

impl RestoreReport {
    pub fn new(engine: EngineKind, tables: Vec<TableReport>) -> Self {
        let total = tables.iter().map(|t| t.inserted).sum();
        Self {
            engine,
            tables,
            total,
        }
    }
}

/// A persistence backend that can replace table contents.
#[async_trait]
pub trait RestoreEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Deletes every table in `order` (children first) and inserts the
    /// rows (parents first).
    async fn restore(&self, prepared: &PreparedRestore) -> Result<Vec<TableReport>, BackupError>;
}

fn scheme_of(database_url: &str) -> String {
    match url::Url::parse(database_url) {
        Ok(url) => url.scheme().to_ascii_lowercase(),
        Err(_) => database_url
            .split(':')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase(),
    }
}

/// Engines to try, preferred first. The remote engine only takes part when
/// it is configured.
pub fn engine_order(
    prefer: BackupPreference,
    database_url: &str,
    remote_configured: bool,
) -> Vec<EngineKind> {
    let sql_first = match prefer {
        BackupPreference::Sql => true,
        BackupPreference::Remote => false,
        BackupPreference::Auto => DIRECT_SCHEMES.contains(&scheme_of(database_url).as_str()),
    };
    let order = if sql_first {
        [EngineKind::Sql, EngineKind::Remote]
    } else {
        [EngineKind::Remote, EngineKind::Sql]
    };
    order
        .into_iter()
        .filter(|kind| *kind == EngineKind::Sql || remote_configured)
        .collect()
}

/// Runs the engines in order and returns the first success. A later engine
/// runs only when every earlier one failed outright.
pub async fn restore_with_fallback(
    engines: &[Arc<dyn RestoreEngine>],
    prepared: &PreparedRestore,
) -> Result<RestoreReport, BackupError> {
    if engines.is_empty() {
        return Err(BackupError::NoEngine);
    }

    let mut failures = Vec::new();
    for (attempt, engine) in engines.iter().enumerate() {
        let kind = engine.kind();
        if attempt > 0 {
            warn!(engine = %kind, "falling back to alternate restore engine");
        }
        info!(
            engine = %kind,
            tables = prepared.order.len(),
            rows = prepared.tables.values().map(TableRows::len).sum::<usize>(),
            "restore started"
        );

        match engine.restore(prepared).await {
            Ok(tables) => {
                for t in &tables {
                    if t.skipped {
                        warn!(engine = %kind, table = %t.table, reason = ?t.reason, "table skipped");
                    } else {
                        info!(engine = %kind, table = %t.table, inserted = t.inserted, "table restored");
                        metrics::counter!(
                            "opname_restore_rows_total",
                            t.inserted,
                            "engine" => kind.to_string(),
                            "table" => t.table.clone()
                        );
                    }
                }
                let report = RestoreReport::new(kind, tables);
                info!(engine = %kind, total = report.total, "restore finished");
                return Ok(report);
            }
            Err(e) => {
                warn!(engine = %kind, error = %e, "restore engine failed");
                metrics::counter!("opname_restore_failures_total", 1, "engine" => kind.to_string());
                failures.push((kind, e.to_string()));
            }
        }
    }

    Err(BackupError::AllEnginesFailed(
        failures
            .into_iter()
            .map(|(kind, message)| format!("{}: {}", kind, message))
            .collect::<Vec<_>>()
            .join("; "),
    ))
}
