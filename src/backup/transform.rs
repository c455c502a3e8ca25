//! Row transforms from dump JSON into typed models.
//!
//! Dumps come from different generations of the app: keys may be snake_case
//! or camelCase, numbers may arrive as strings, dates in several shapes and
//! ids as plain integers. Non-UUID ids map to v5 UUIDs keyed by the table
//! they identify, so foreign keys written with the same raw id still match.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use uuid::Uuid;

use super::BackupError;
use crate::entities::{
    asset, asset_checkout, category, department, employee, site, so_asset_entry, so_session, user,
    AssetStatus, CheckoutStatus, SessionStatus, UserRole,
};

lazy_static! {
    static ref ID_NAMESPACE: Uuid = Uuid::new_v5(&Uuid::NAMESPACE_URL, b"opname-api/backup-ids");
}

/// Deterministic UUID for a raw id of `table`.
pub fn mapped_id(table: &str, raw: &str) -> Uuid {
    match Uuid::parse_str(raw.trim()) {
        Ok(id) => id,
        Err(_) => Uuid::new_v5(&ID_NAMESPACE, format!("{}:{}", table, raw.trim()).as_bytes()),
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Typed access to one dump row.
pub struct RowReader<'a> {
    table: &'a str,
    row: &'a Map<String, Value>,
}

impl<'a> RowReader<'a> {
    pub fn new(table: &'a str, row: &'a Map<String, Value>) -> Self {
        Self { table, row }
    }

    fn raw(&self, field: &str) -> Option<&'a Value> {
        let value = match self.row.get(field) {
            Some(v) => Some(v),
            None => self.row.get(&camel_case(field)),
        };
        value.filter(|v| !v.is_null())
    }

    fn invalid(&self, field: &str, message: impl Into<String>) -> BackupError {
        BackupError::InvalidValue {
            table: self.table.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn missing(&self, field: &str) -> BackupError {
        BackupError::MissingField {
            table: self.table.to_string(),
            field: field.to_string(),
        }
    }

    fn require<T>(&self, field: &str, value: Option<T>) -> Result<T, BackupError> {
        value.ok_or_else(|| self.missing(field))
    }

    pub fn string(&self, field: &str) -> Option<String> {
        self.raw(field).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn required_string(&self, field: &str) -> Result<String, BackupError> {
        self.require(field, self.string(field))
    }

    pub fn bool(&self, field: &str) -> Result<Option<bool>, BackupError> {
        let Some(v) = self.raw(field) else {
            return Ok(None);
        };
        match v {
            Value::Bool(b) => Ok(Some(*b)),
            Value::Number(n) => Ok(Some(n.as_f64().unwrap_or(0.0) != 0.0)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" | "y" => Ok(Some(true)),
                "false" | "f" | "0" | "no" | "n" => Ok(Some(false)),
                "" => Ok(None),
                other => Err(self.invalid(field, format!("'{}' is not a boolean", other))),
            },
            other => Err(self.invalid(field, format!("{} is not a boolean", other))),
        }
    }

    pub fn i32(&self, field: &str) -> Result<Option<i32>, BackupError> {
        let Some(v) = self.raw(field) else {
            return Ok(None);
        };
        let parsed = match v {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) if s.trim().is_empty() => return Ok(None),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        parsed
            .and_then(|n| i32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| self.invalid(field, format!("{} is not an integer", v)))
    }

    pub fn decimal(&self, field: &str) -> Result<Option<Decimal>, BackupError> {
        let Some(v) = self.raw(field) else {
            return Ok(None);
        };
        let text = match v {
            Value::Number(n) => n.to_string(),
            Value::String(s) if s.trim().is_empty() => return Ok(None),
            Value::String(s) => s.trim().to_string(),
            other => return Err(self.invalid(field, format!("{} is not a number", other))),
        };
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map(Some)
            .map_err(|e| self.invalid(field, e.to_string()))
    }

    /// RFC 3339, `YYYY-MM-DD[ HH:MM:SS]` (taken as UTC) or epoch millis.
    pub fn datetime(&self, field: &str) -> Result<Option<DateTime<Utc>>, BackupError> {
        let Some(v) = self.raw(field) else {
            return Ok(None);
        };
        match v {
            Value::Number(n) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .map(Some)
                .ok_or_else(|| self.invalid(field, format!("{} is not epoch millis", n))),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => parse_datetime(s.trim())
                .map(Some)
                .ok_or_else(|| self.invalid(field, format!("'{}' is not a date", s))),
            other => Err(self.invalid(field, format!("{} is not a date", other))),
        }
    }

    pub fn datetime_or_now(&self, field: &str) -> Result<DateTime<Utc>, BackupError> {
        Ok(self.datetime(field)?.unwrap_or_else(Utc::now))
    }

    pub fn date(&self, field: &str) -> Result<Option<NaiveDate>, BackupError> {
        if let Some(Value::String(s)) = self.raw(field) {
            if let Ok(d) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
                return Ok(Some(d));
            }
        }
        Ok(self.datetime(field)?.map(|dt| dt.date_naive()))
    }

    /// Id of a row in `table`, mapped through [`mapped_id`].
    pub fn id_of(&self, field: &str, table: &str) -> Option<Uuid> {
        self.string(field)
            .filter(|s| !s.trim().is_empty())
            .map(|raw| mapped_id(table, &raw))
    }

    pub fn required_id_of(&self, field: &str, table: &str) -> Result<Uuid, BackupError> {
        self.require(field, self.id_of(field, table))
    }

    pub fn parsed<T>(&self, field: &str) -> Result<Option<T>, BackupError>
    where
        T: FromStr<Err = String>,
    {
        self.string(field)
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<T>().map_err(|e| self.invalid(field, e)))
            .transpose()
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }
    if let Ok(millis) = s.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis);
    }
    None
}

fn checkout_status(s: &str) -> Result<CheckoutStatus, String> {
    match s.trim().to_ascii_uppercase().as_str() {
        "OUT" | "CHECKED_OUT" => Ok(CheckoutStatus::Out),
        "RETURNED" | "IN" | "CHECKED_IN" => Ok(CheckoutStatus::Returned),
        other => Err(format!("unknown checkout status '{}'", other)),
    }
}

fn session_status(s: &str) -> Result<SessionStatus, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "active" => Ok(SessionStatus::Active),
        "completed" => Ok(SessionStatus::Completed),
        "cancelled" | "canceled" => Ok(SessionStatus::Cancelled),
        other => Err(format!("unknown session status '{}'", other)),
    }
}

/// Transformed rows of one table.
#[derive(Debug, Clone)]
pub enum TableRows {
    Sites(Vec<site::Model>),
    Categories(Vec<category::Model>),
    Departments(Vec<department::Model>),
    Employees(Vec<employee::Model>),
    Users(Vec<user::Model>),
    Assets(Vec<asset::Model>),
    SoSessions(Vec<so_session::Model>),
    SoAssetEntries(Vec<so_asset_entry::Model>),
    AssetCheckouts(Vec<asset_checkout::Model>),
    /// Table this service does not know; rows are kept as dumped.
    Unknown(Vec<Value>),
}

impl TableRows {
    pub fn len(&self) -> usize {
        match self {
            TableRows::Sites(r) => r.len(),
            TableRows::Categories(r) => r.len(),
            TableRows::Departments(r) => r.len(),
            TableRows::Employees(r) => r.len(),
            TableRows::Users(r) => r.len(),
            TableRows::Assets(r) => r.len(),
            TableRows::SoSessions(r) => r.len(),
            TableRows::SoAssetEntries(r) => r.len(),
            TableRows::AssetCheckouts(r) => r.len(),
            TableRows::Unknown(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows as snake_case JSON objects, ready for a table-store API.
    pub fn to_json(&self) -> Result<Vec<Value>, BackupError> {
        fn all<T: serde::Serialize>(rows: &[T]) -> Result<Vec<Value>, BackupError> {
            rows.iter()
                .map(|r| serde_json::to_value(r).map_err(|e| BackupError::InvalidJson(e.to_string())))
                .collect()
        }
        match self {
            TableRows::Sites(r) => all(r),
            TableRows::Categories(r) => all(r),
            TableRows::Departments(r) => all(r),
            TableRows::Employees(r) => all(r),
            TableRows::Users(r) => all(r),
            TableRows::Assets(r) => all(r),
            TableRows::SoSessions(r) => all(r),
            TableRows::SoAssetEntries(r) => all(r),
            TableRows::AssetCheckouts(r) => all(r),
            TableRows::Unknown(r) => Ok(r.clone()),
        }
    }
}

fn rows_of<'a, T>(
    table: &'a str,
    rows: &'a [Value],
    f: impl Fn(&RowReader<'a>, usize) -> Result<T, BackupError>,
) -> Result<Vec<T>, BackupError> {
    rows.iter()
        .enumerate()
        .map(|(idx, value)| {
            let obj = value.as_object().ok_or_else(|| {
                BackupError::InvalidJson(format!("row {} of table '{}' is not an object", idx, table))
            })?;
            f(&RowReader::new(table, obj), idx)
        })
        .collect()
}

type LookupRow = (Uuid, String, i32, DateTime<Utc>, DateTime<Utc>);

/// Sites, categories and departments share one shape. Rows without an
/// order keep their dump position.
fn lookup_row(r: &RowReader<'_>, idx: usize, table: &str) -> Result<LookupRow, BackupError> {
    Ok((
        r.required_id_of("id", table)?,
        r.required_string("name")?,
        r.i32("sort_order")?.unwrap_or(idx as i32 + 1),
        r.datetime_or_now("created_at")?,
        r.datetime_or_now("updated_at")?,
    ))
}

/// Transforms the dump rows of a (normalized) table name.
pub fn transform_table(table: &str, rows: &[Value]) -> Result<TableRows, BackupError> {
    Ok(match table {
        "sites" => TableRows::Sites(rows_of(table, rows, |r, idx| {
            let (id, name, sort_order, created_at, updated_at) = lookup_row(r, idx, "sites")?;
            Ok(site::Model { id, name, sort_order, created_at, updated_at })
        })?),
        "categories" => TableRows::Categories(rows_of(table, rows, |r, idx| {
            let (id, name, sort_order, created_at, updated_at) = lookup_row(r, idx, "categories")?;
            Ok(category::Model { id, name, sort_order, created_at, updated_at })
        })?),
        "departments" => TableRows::Departments(rows_of(table, rows, |r, idx| {
            let (id, name, sort_order, created_at, updated_at) = lookup_row(r, idx, "departments")?;
            Ok(department::Model { id, name, sort_order, created_at, updated_at })
        })?),
        "employees" => TableRows::Employees(rows_of(table, rows, |r, _| {
            Ok(employee::Model {
                id: r.required_id_of("id", "employees")?,
                employee_code: r.required_string("employee_code")?,
                name: r.required_string("name")?,
                email: r.string("email"),
                phone: r.string("phone"),
                department: r.string("department"),
                position: r.string("position"),
                is_active: r.bool("is_active")?.unwrap_or(true),
                created_at: r.datetime_or_now("created_at")?,
                updated_at: r.datetime_or_now("updated_at")?,
            })
        })?),
        "users" => TableRows::Users(rows_of(table, rows, |r, _| {
            Ok(user::Model {
                id: r.required_id_of("id", "users")?,
                email: r.required_string("email")?.trim().to_lowercase(),
                name: r.string("name").unwrap_or_default(),
                password_hash: r.required_string("password_hash")?,
                role: r.parsed::<UserRole>("role")?.unwrap_or(UserRole::Viewer),
                is_active: r.bool("is_active")?.unwrap_or(true),
                created_at: r.datetime_or_now("created_at")?,
                updated_at: r.datetime_or_now("updated_at")?,
            })
        })?),
        "assets" => TableRows::Assets(rows_of(table, rows, |r, _| {
            Ok(asset::Model {
                id: r.required_id_of("id", "assets")?,
                no_asset: r.required_string("no_asset")?,
                name: r.required_string("name")?,
                status: r.parsed::<AssetStatus>("status")?.unwrap_or(AssetStatus::Active),
                serial_no: r.string("serial_no"),
                brand: r.string("brand"),
                model: r.string("model"),
                cost: r.decimal("cost")?,
                site_id: r.id_of("site_id", "sites"),
                category_id: r.id_of("category_id", "categories"),
                department_id: r.id_of("department_id", "departments"),
                pic_id: r.id_of("pic_id", "employees"),
                pic: r.string("pic"),
                notes: r.string("notes"),
                image_url: r.string("image_url"),
                purchase_date: r.date("purchase_date")?,
                created_at: r.datetime_or_now("created_at")?,
                updated_at: r.datetime_or_now("updated_at")?,
            })
        })?),
        "so_sessions" => TableRows::SoSessions(rows_of(table, rows, |r, _| {
            let status = match r.string("status") {
                Some(s) if !s.trim().is_empty() => session_status(&s)
                    .map_err(|e| r.invalid("status", e))?,
                _ => SessionStatus::Active,
            };
            let started_at = r.datetime_or_now("started_at")?;
            Ok(so_session::Model {
                id: r.required_id_of("id", "so_sessions")?,
                name: r.required_string("name")?,
                year: r.i32("year")?.unwrap_or_else(|| {
                    use chrono::Datelike;
                    started_at.year()
                }),
                description: r.string("description"),
                status,
                total_assets: r.i32("total_assets")?.unwrap_or(0),
                scanned_assets: r.i32("scanned_assets")?.unwrap_or(0),
                verified_assets: r.i32("verified_assets")?.unwrap_or(0),
                started_at,
                completed_at: r.datetime("completed_at")?,
                created_by: r.id_of("created_by", "users"),
                created_at: r.datetime_or_now("created_at")?,
                updated_at: r.datetime_or_now("updated_at")?,
            })
        })?),
        "so_asset_entries" => TableRows::SoAssetEntries(rows_of(table, rows, |r, _| {
            Ok(so_asset_entry::Model {
                id: r.required_id_of("id", "so_asset_entries")?,
                so_session_id: r.required_id_of("so_session_id", "so_sessions")?,
                asset_id: r.required_id_of("asset_id", "assets")?,
                scanned_at: r.datetime_or_now("scanned_at")?,
                scanned_by: r.id_of("scanned_by", "users"),
                is_identified: r.bool("is_identified")?.unwrap_or(false),
                temp_name: r.string("temp_name"),
                temp_status: r.parsed::<AssetStatus>("temp_status")?,
                temp_serial_no: r.string("temp_serial_no"),
                temp_pic: r.string("temp_pic"),
                temp_pic_id: r.id_of("temp_pic_id", "employees"),
                temp_notes: r.string("temp_notes"),
                temp_brand: r.string("temp_brand"),
                temp_model: r.string("temp_model"),
                temp_site_id: r.id_of("temp_site_id", "sites"),
                temp_category_id: r.id_of("temp_category_id", "categories"),
                temp_department_id: r.id_of("temp_department_id", "departments"),
                temp_image_url: r.string("temp_image_url"),
                created_at: r.datetime_or_now("created_at")?,
                updated_at: r.datetime_or_now("updated_at")?,
            })
        })?),
        "asset_checkouts" => TableRows::AssetCheckouts(rows_of(table, rows, |r, _| {
            let status = match r.string("status") {
                Some(s) if !s.trim().is_empty() => checkout_status(&s)
                    .map_err(|e| r.invalid("status", e))?,
                _ => CheckoutStatus::Out,
            };
            Ok(asset_checkout::Model {
                id: r.required_id_of("id", "asset_checkouts")?,
                asset_id: r.required_id_of("asset_id", "assets")?,
                employee_id: r.id_of("employee_id", "employees"),
                assigned_to: r.required_string("assigned_to")?,
                checkout_date: r.datetime_or_now("checkout_date")?,
                due_date: r.datetime("due_date")?,
                return_date: r.datetime("return_date")?,
                checkout_signature: r.string("checkout_signature"),
                return_signature: r.string("return_signature"),
                notes: r.string("notes"),
                status,
                created_at: r.datetime_or_now("created_at")?,
                updated_at: r.datetime_or_now("updated_at")?,
            })
        })?),
        _ => TableRows::Unknown(rows.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn one(table: &str, row: Value) -> Result<TableRows, BackupError> {
        transform_table(table, &[row])
    }

    #[test]
    fn accepts_camel_case_and_coerces_values() {
        let rows = one(
            "assets",
            json!({
                "id": 7,
                "noAsset": "0001/I/001",
                "name": "Laptop",
                "status": "lost/missing",
                "cost": "1250000.5",
                "siteId": 3,
                "picId": "EMP-9",
                "purchaseDate": "2023-02-01",
                "createdAt": 1_700_000_000_000i64
            }),
        )
        .unwrap();
        let TableRows::Assets(assets) = rows else {
            panic!("expected assets");
        };
        let a = &assets[0];
        assert_eq!(a.id, mapped_id("assets", "7"));
        assert_eq!(a.status, AssetStatus::LostMissing);
        assert_eq!(a.cost, Some(Decimal::from_str("1250000.5").unwrap()));
        assert_eq!(a.site_id, Some(mapped_id("sites", "3")));
        assert_eq!(a.pic_id, Some(mapped_id("employees", "EMP-9")));
        assert_eq!(a.purchase_date, NaiveDate::from_ymd_opt(2023, 2, 1));
        assert_eq!(a.created_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn foreign_keys_map_to_the_same_uuid_as_the_parent_row() {
        let TableRows::Sites(sites) = one("sites", json!({"id": 3, "name": "Gudang"})).unwrap() else {
            panic!("expected sites");
        };
        let TableRows::Assets(assets) = one(
            "assets",
            json!({"id": "a1", "no_asset": "X", "name": "Y", "site_id": "3"}),
        )
        .unwrap() else {
            panic!("expected assets");
        };
        assert_eq!(assets[0].site_id, Some(sites[0].id));
        assert_eq!(sites[0].sort_order, 1);
    }

    #[test]
    fn uuid_ids_pass_through() {
        let id = Uuid::new_v4();
        assert_eq!(mapped_id("assets", &id.to_string()), id);
        assert_ne!(mapped_id("assets", "1"), mapped_id("sites", "1"));
    }

    #[test]
    fn missing_required_field_names_table_and_field() {
        let err = one("employees", json!({"id": 1, "name": "Ani"})).unwrap_err();
        assert_matches!(&err, BackupError::MissingField { table, field }
            if table == "employees" && field == "employee_code");
        assert_eq!(
            err.to_string(),
            "missing required field 'employee_code' in table 'employees'"
        );
    }

    #[test]
    fn dates_in_several_shapes() {
        for raw in [
            json!("2024-03-05T10:00:00Z"),
            json!("2024-03-05T17:00:00+07:00"),
            json!("2024-03-05 10:00:00"),
        ] {
            let TableRows::SoSessions(s) =
                one("so_sessions", json!({"id": 1, "name": "SO", "started_at": raw})).unwrap()
            else {
                panic!("expected sessions");
            };
            assert_eq!(s[0].started_at.to_rfc3339(), "2024-03-05T10:00:00+00:00");
            assert_eq!(s[0].year, 2024);
        }
    }

    #[test]
    fn unknown_tables_keep_raw_rows() {
        let rows = one("audit_logs", json!({"anything": true})).unwrap();
        assert_matches!(&rows, TableRows::Unknown(_));
        assert_eq!(rows.to_json().unwrap(), vec![json!({"anything": true})]);
    }

    #[test]
    fn bad_booleans_are_rejected() {
        let err = one(
            "employees",
            json!({"id": 1, "employee_code": "E1", "name": "Ani", "is_active": "maybe"}),
        )
        .unwrap_err();
        assert_matches!(err, BackupError::InvalidValue { .. });
    }
}
