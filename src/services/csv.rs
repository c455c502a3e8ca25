//! CSV export/import for assets and employees.
//!
//! Imports read columns by header name (case-insensitive, any order), trim
//! every cell and treat empty cells as absent. Rows upsert on their natural
//! key; a bad row is reported and skipped without aborting the rest.

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    assets::{AssetService, CreateAssetInput, UpdateAssetInput},
    employees::{CreateEmployeeInput, EmployeeService},
};
use crate::{
    entities::{asset, employee, AssetStatus},
    errors::ServiceError,
};

pub const ASSET_HEADER: [&str; 12] = [
    "noAsset",
    "name",
    "serialNo",
    "cost",
    "status",
    "pic",
    "notes",
    "brand",
    "model",
    "categoryId",
    "siteId",
    "departmentId",
];

pub const EMPLOYEE_HEADER: [&str; 7] = [
    "employeeCode",
    "name",
    "email",
    "phone",
    "department",
    "position",
    "isActive",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ImportLineError {
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ImportReport {
    pub created: u64,
    pub updated: u64,
    pub errors: Vec<ImportLineError>,
}

fn csv_error(e: csv::Error) -> ServiceError {
    ServiceError::InvalidInput(format!("malformed CSV: {}", e))
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, ServiceError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ServiceError::InternalError(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ServiceError::InternalError(e.to_string()))
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn opt_id(value: Option<Uuid>) -> String {
    value.map(|id| id.to_string()).unwrap_or_default()
}

pub fn write_assets(assets: &[asset::Model]) -> Result<String, ServiceError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(ASSET_HEADER).map_err(csv_error)?;
    for a in assets {
        let cost = a.cost.map(|c| c.to_string()).unwrap_or_default();
        let status = a.status.to_string();
        let (category, site, department) = (
            opt_id(a.category_id),
            opt_id(a.site_id),
            opt_id(a.department_id),
        );
        writer
            .write_record([
                a.no_asset.as_str(),
                a.name.as_str(),
                opt(&a.serial_no),
                cost.as_str(),
                status.as_str(),
                opt(&a.pic),
                opt(&a.notes),
                opt(&a.brand),
                opt(&a.model),
                category.as_str(),
                site.as_str(),
                department.as_str(),
            ])
            .map_err(csv_error)?;
    }
    finish(writer)
}

pub fn write_employees(employees: &[employee::Model]) -> Result<String, ServiceError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(EMPLOYEE_HEADER).map_err(csv_error)?;
    for e in employees {
        writer
            .write_record([
                e.employee_code.as_str(),
                e.name.as_str(),
                opt(&e.email),
                opt(&e.phone),
                opt(&e.department),
                opt(&e.position),
                if e.is_active { "true" } else { "false" },
            ])
            .map_err(csv_error)?;
    }
    finish(writer)
}

/// One data row addressed by header name.
struct Row<'a> {
    columns: &'a HashMap<String, usize>,
    record: &'a StringRecord,
}

impl<'a> Row<'a> {
    fn get(&self, name: &str) -> Option<String> {
        self.columns
            .get(&name.to_ascii_lowercase())
            .and_then(|idx| self.record.get(*idx))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn required(&self, name: &str) -> Result<String, String> {
        self.get(name).ok_or_else(|| format!("{} is required", name))
    }

    fn parsed<T, E>(&self, name: &str) -> Result<Option<T>, String>
    where
        T: FromStr<Err = E>,
        E: std::fmt::Display,
    {
        self.get(name)
            .map(|v| v.parse::<T>().map_err(|e| format!("invalid {} '{}': {}", name, v, e)))
            .transpose()
    }
}

/// Parses text into rows keyed by lower-cased header, with their line numbers.
fn read_rows<T>(
    text: &str,
    mut convert: impl FnMut(&Row<'_>) -> Result<T, String>,
) -> Result<(Vec<(u64, T)>, Vec<ImportLineError>), ServiceError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.trim_start_matches('\u{feff}').as_bytes());

    let columns: HashMap<String, usize> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
        .collect();

    let mut rows = Vec::new();
    let mut errors = Vec::new();
    for result in reader.records() {
        match result {
            Ok(record) => {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                if record.iter().all(|cell| cell.trim().is_empty()) {
                    continue;
                }
                let row = Row {
                    columns: &columns,
                    record: &record,
                };
                match convert(&row) {
                    Ok(value) => rows.push((line, value)),
                    Err(message) => errors.push(ImportLineError { line, message }),
                }
            }
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                errors.push(ImportLineError {
                    line,
                    message: e.to_string(),
                });
            }
        }
    }
    Ok((rows, errors))
}

pub fn parse_assets(
    text: &str,
) -> Result<(Vec<(u64, CreateAssetInput)>, Vec<ImportLineError>), ServiceError> {
    read_rows(text, |row| {
        Ok(CreateAssetInput {
            no_asset: Some(row.required("noAsset")?),
            prefix: None,
            name: row.required("name")?,
            status: row.parsed::<AssetStatus, _>("status")?,
            serial_no: row.get("serialNo"),
            brand: row.get("brand"),
            model: row.get("model"),
            cost: row.parsed::<Decimal, _>("cost")?,
            site_id: row.parsed::<Uuid, _>("siteId")?,
            category_id: row.parsed::<Uuid, _>("categoryId")?,
            department_id: row.parsed::<Uuid, _>("departmentId")?,
            pic_id: None,
            pic: row.get("pic"),
            notes: row.get("notes"),
            image_url: None,
            purchase_date: None,
        })
    })
}

fn parse_flag(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "active" => Ok(true),
        "false" | "0" | "no" | "n" | "inactive" => Ok(false),
        other => Err(format!("invalid isActive '{}'", other)),
    }
}

pub fn parse_employees(
    text: &str,
) -> Result<(Vec<(u64, CreateEmployeeInput)>, Vec<ImportLineError>), ServiceError> {
    read_rows(text, |row| {
        Ok(CreateEmployeeInput {
            employee_code: row.required("employeeCode")?,
            name: row.required("name")?,
            email: row.get("email"),
            phone: row.get("phone"),
            department: row.get("department"),
            position: row.get("position"),
            is_active: row.get("isActive").map(|v| parse_flag(&v)).transpose()?,
        })
    })
}

/// CSV import/export over the asset and employee services.
#[derive(Clone)]
pub struct CsvService {
    assets: AssetService,
    employees: EmployeeService,
}

impl CsvService {
    pub fn new(assets: AssetService, employees: EmployeeService) -> Self {
        Self { assets, employees }
    }

    #[instrument(skip(self))]
    pub async fn export_assets(&self) -> Result<String, ServiceError> {
        write_assets(&self.assets.all().await?)
    }

    #[instrument(skip(self))]
    pub async fn export_employees(&self) -> Result<String, ServiceError> {
        let all = self.employees.list(&Default::default()).await?;
        write_employees(&all)
    }

    #[instrument(skip(self, text), fields(bytes = text.len()))]
    pub async fn import_assets(&self, text: &str) -> Result<ImportReport, ServiceError> {
        let (rows, errors) = parse_assets(text)?;
        let mut report = ImportReport {
            errors,
            ..Default::default()
        };

        for (line, input) in rows {
            let number = input.no_asset.clone().unwrap_or_default();
            let outcome = match self.assets.find_by_number(&number).await {
                Ok(Some(existing)) => self
                    .assets
                    .update(existing.id, update_from(input))
                    .await
                    .map(|_| false),
                Ok(None) => self.assets.create(input).await.map(|_| true),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(true) => report.created += 1,
                Ok(false) => report.updated += 1,
                Err(e) => report.errors.push(ImportLineError {
                    line,
                    message: e.response_message(),
                }),
            }
        }

        if !report.errors.is_empty() {
            warn!(failed = report.errors.len(), "asset import finished with errors");
        }
        info!(created = report.created, updated = report.updated, "asset import finished");
        Ok(report)
    }

    #[instrument(skip(self, text), fields(bytes = text.len()))]
    pub async fn import_employees(&self, text: &str) -> Result<ImportReport, ServiceError> {
        let (rows, errors) = parse_employees(text)?;
        let mut report = ImportReport {
            errors,
            ..Default::default()
        };

        for (line, input) in rows {
            match self.employees.upsert_by_code(input).await {
                Ok(true) => report.created += 1,
                Ok(false) => report.updated += 1,
                Err(e) => report.errors.push(ImportLineError {
                    line,
                    message: e.response_message(),
                }),
            }
        }

        info!(created = report.created, updated = report.updated, "employee import finished");
        Ok(report)
    }
}

fn update_from(input: CreateAssetInput) -> UpdateAssetInput {
    UpdateAssetInput {
        no_asset: None,
        name: Some(input.name),
        status: input.status,
        serial_no: input.serial_no,
        brand: input.brand,
        model: input.model,
        cost: input.cost,
        site_id: input.site_id,
        category_id: input.category_id,
        department_id: input.department_id,
        pic_id: input.pic_id,
        pic: input.pic,
        notes: input.notes,
        image_url: input.image_url,
        purchase_date: input.purchase_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn asset(no: &str, name: &str, notes: Option<&str>) -> asset::Model {
        let now = Utc::now();
        asset::Model {
            id: Uuid::new_v4(),
            no_asset: no.into(),
            name: name.into(),
            status: AssetStatus::LostMissing,
            serial_no: Some("SN-1".into()),
            brand: None,
            model: None,
            cost: Some(dec!(1500000.50)),
            site_id: None,
            category_id: None,
            department_id: None,
            pic_id: None,
            pic: Some("Budi".into()),
            notes: notes.map(str::to_string),
            image_url: None,
            purchase_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn asset_export_has_exact_header_and_quotes_when_needed() {
        let text = write_assets(&[asset("0001/I/001", "Desk, oak", Some("line \"one\"\nline two"))])
            .unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "noAsset,name,serialNo,cost,status,pic,notes,brand,model,categoryId,siteId,departmentId"
        );
        assert!(text.contains("\"Desk, oak\""));
        assert!(text.contains("\"line \"\"one\"\"\nline two\""));
        assert!(text.contains("Lost/Missing"));
    }

    #[test]
    fn exported_assets_parse_back() {
        let original = asset("0001/I/001", "Desk, oak", Some("{\"color\":\"brown\"}"));
        let text = write_assets(std::slice::from_ref(&original)).unwrap();
        let (rows, errors) = parse_assets(&text).unwrap();
        assert!(errors.is_empty());
        let (_, parsed) = &rows[0];
        assert_eq!(parsed.no_asset.as_deref(), Some("0001/I/001"));
        assert_eq!(parsed.name, "Desk, oak");
        assert_eq!(parsed.status, Some(AssetStatus::LostMissing));
        assert_eq!(parsed.cost, Some(dec!(1500000.50)));
        assert_eq!(parsed.notes, original.notes);
        assert_eq!(parsed.brand, None);
    }

    #[test]
    fn import_matches_headers_loosely_and_collects_line_errors() {
        let text = "NAME , noasset,Cost\n Chair ,A-1,\nTable,,10\nLamp,A-3,abc\n";
        let (rows, errors) = parse_assets(text).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.name, "Chair");
        assert_eq!(rows[0].1.cost, None);
        assert_eq!(
            errors.iter().map(|e| e.line).collect::<Vec<_>>(),
            vec![3, 4]
        );
        assert!(errors[0].message.contains("noAsset"));
    }

    #[test]
    fn employees_round_trip_flags() {
        let text = "employeeCode,name,isActive\nE1,Ani,no\nE2,Budi,\nE3,Cici,maybe\n";
        let (rows, errors) = parse_employees(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1.is_active, Some(false));
        assert_eq!(rows[1].1.is_active, None);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 4);
    }
}
