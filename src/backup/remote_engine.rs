//! Restore through a PostgREST-style HTTP table store.
//!
//! Each table is one REST resource under the base URL. There is no
//! cross-table transaction: a failure part-way leaves earlier tables
//! restored.

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

use super::engine::{EngineKind, PreparedRestore, RestoreEngine, TableReport};
use super::BackupError;

/// PostgreSQL "undefined table" and PostgREST "relation not in schema cache".
const MISSING_TABLE_CODES: [&str; 2] = ["42P01", "PGRST205"];

pub struct RemoteEngine {
    client: Client,
    base_url: String,
    api_key: String,
    batch_size: usize,
}

/// Whether a failed response means the table does not exist remotely.
pub fn is_missing_table(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::NOT_FOUND {
        return true;
    }
    let code = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("code").and_then(Value::as_str).map(str::to_string));
    match code {
        Some(code) => MISSING_TABLE_CODES.contains(&code.as_str()),
        None => MISSING_TABLE_CODES.iter().any(|c| body.contains(c)),
    }
}

enum Outcome {
    Done,
    MissingTable,
}

impl RemoteEngine {
    pub fn new(
        base_url: &str,
        api_key: &str,
        batch_size: usize,
        timeout: Duration,
    ) -> Result<Self, BackupError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackupError::Engine(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            batch_size: batch_size.max(1),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header("Prefer", "return=minimal")
    }

    async fn check(&self, table: &str, action: &str, response: Response) -> Result<Outcome, BackupError> {
        let status = response.status();
        if status.is_success() {
            return Ok(Outcome::Done);
        }
        let body = response.text().await.unwrap_or_default();
        if is_missing_table(status, &body) {
            return Ok(Outcome::MissingTable);
        }
        Err(BackupError::Engine(format!(
            "{} {} failed with {}: {}",
            action,
            table,
            status,
            body.chars().take(300).collect::<String>()
        )))
    }

    async fn clear(&self, table: &str) -> Result<Outcome, BackupError> {
        let response = self
            .request(reqwest::Method::DELETE, &self.table_url(table))
            .query(&[("id", "not.is.null")])
            .send()
            .await
            .map_err(|e| BackupError::Engine(format!("delete {}: {}", table, e)))?;
        self.check(table, "delete", response).await
    }

    async fn insert(&self, table: &str, rows: &[Value]) -> Result<Outcome, BackupError> {
        for chunk in rows.chunks(self.batch_size) {
            let response = self
                .request(reqwest::Method::POST, &self.table_url(table))
                .json(chunk)
                .send()
                .await
                .map_err(|e| BackupError::Engine(format!("insert {}: {}", table, e)))?;
            if let Outcome::MissingTable = self.check(table, "insert", response).await? {
                return Ok(Outcome::MissingTable);
            }
            debug!(table, rows = chunk.len(), "batch inserted");
        }
        Ok(Outcome::Done)
    }
}

#[async_trait]
impl RestoreEngine for RemoteEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Remote
    }

    async fn restore(&self, prepared: &PreparedRestore) -> Result<Vec<TableReport>, BackupError> {
        let mut missing = HashSet::new();
        for table in prepared.order.iter().rev() {
            if let Outcome::MissingTable = self.clear(table).await? {
                warn!(table = %table, "table missing on remote store");
                missing.insert(table.clone());
            }
        }

        let mut reports = Vec::with_capacity(prepared.order.len());
        for table in &prepared.order {
            if missing.contains(table) {
                if prepared.tables.contains_key(table) {
                    reports.push(TableReport::skipped(table, "table not found on remote store"));
                }
                continue;
            }
            let rows = match prepared.tables.get(table) {
                Some(rows) if !rows.is_empty() => rows.to_json()?,
                _ => {
                    reports.push(TableReport::inserted(table, 0));
                    continue;
                }
            };
            match self.insert(table, &rows).await? {
                Outcome::Done => reports.push(TableReport::inserted(table, rows.len() as u64)),
                Outcome::MissingTable => {
                    reports.push(TableReport::skipped(table, "table not found on remote store"))
                }
            }
        }
        Ok(reports)
    }
}
