//! Zip archive layout: `database.json` (table → rows) and `metadata.json`,
//! either at the root or one directory down.
//!
//! Everything here is blocking; callers run it under `spawn_blocking`.
//! Reading never extracts to disk and only inflates the two JSON files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, Write};
use tracing::debug;

use super::BackupError;

pub const DATABASE_FILE: &str = "database.json";
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BackupMetadata {
    #[serde(default, alias = "exportedAt")]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: Option<String>,
    /// Restore order declared by the exporter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,
}

/// Parsed archive contents.
#[derive(Debug, Clone, Default)]
pub struct BackupArchive {
    pub database: Map<String, Value>,
    pub metadata: BackupMetadata,
}

/// Directory prefix (`""` for the root, `"name/"` one level down) of the
/// first location holding both files. The root wins, then folders by name.
fn locate<'a>(names: impl Iterator<Item = &'a str>) -> Result<String, BackupError> {
    let mut found: BTreeMap<String, (bool, bool)> = BTreeMap::new();
    for name in names {
        let (dir, file) = match name.rsplit_once('/') {
            Some((dir, file)) if !dir.is_empty() && !dir.contains('/') => {
                (format!("{}/", dir), file)
            }
            Some(_) => continue,
            None => (String::new(), name),
        };
        let slot = found.entry(dir).or_default();
        match file {
            DATABASE_FILE => slot.0 = true,
            METADATA_FILE => slot.1 = true,
            _ => {}
        }
    }
    found
        .into_iter()
        .find(|(_, (db, meta))| *db && *meta)
        .map(|(dir, _)| dir)
        .ok_or(BackupError::MissingFiles)
}

/// Reads one entry, refusing anything that inflates past `limit` bytes.
/// The declared size is checked first; the read is capped regardless.
fn read_entry<R: Read + Seek>(
    zip: &mut zip::ZipArchive<R>,
    name: &str,
    limit: u64,
) -> Result<Vec<u8>, BackupError> {
    let too_large = || BackupError::EntryTooLarge {
        name: name.to_string(),
        limit,
    };
    let file = zip
        .by_name(name)
        .map_err(|e| BackupError::Archive(format!("{}: {}", name, e)))?;
    if file.size() > limit {
        return Err(too_large());
    }

    let mut body = Vec::with_capacity(file.size() as usize);
    file.take(limit + 1)
        .read_to_end(&mut body)
        .map_err(|e| BackupError::Archive(format!("{}: {}", name, e)))?;
    if body.len() as u64 > limit {
        return Err(too_large());
    }
    Ok(body)
}

/// Parses both files straight out of the zip. Nothing is written to disk and
/// no other entry is decompressed.
pub fn read_archive(bytes: &[u8], max_entry_bytes: u64) -> Result<BackupArchive, BackupError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| BackupError::Archive(format!("not a valid zip archive: {}", e)))?;

    let dir = locate(zip.file_names())?;
    debug!(dir = %dir, "found backup files");

    let database_name = format!("{}{}", dir, DATABASE_FILE);
    let database: Value =
        serde_json::from_slice(&read_entry(&mut zip, &database_name, max_entry_bytes)?)
            .map_err(|e| BackupError::InvalidJson(format!("{}: {}", DATABASE_FILE, e)))?;
    let Value::Object(database) = database else {
        return Err(BackupError::InvalidJson(format!(
            "{} must be an object of table name to rows",
            DATABASE_FILE
        )));
    };

    let metadata_name = format!("{}{}", dir, METADATA_FILE);
    let metadata: BackupMetadata =
        serde_json::from_slice(&read_entry(&mut zip, &metadata_name, max_entry_bytes)?)
            .map_err(|e| BackupError::InvalidJson(format!("{}: {}", METADATA_FILE, e)))?;

    Ok(BackupArchive { database, metadata })
}

/// Builds the archive bytes with both files at the root.
pub fn write_archive(archive: &BackupArchive) -> Result<Vec<u8>, BackupError> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let database = serde_json::to_vec_pretty(&archive.database)
        .map_err(|e| BackupError::InvalidJson(e.to_string()))?;
    let metadata = serde_json::to_vec_pretty(&archive.metadata)
        .map_err(|e| BackupError::InvalidJson(e.to_string()))?;

    for (name, body) in [(DATABASE_FILE, database), (METADATA_FILE, metadata)] {
        zip.start_file(name, options)
            .map_err(|e| BackupError::Archive(e.to_string()))?;
        zip.write_all(&body)?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| BackupError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LIMIT: u64 = 1024 * 1024;

    fn zip_with(files: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, body) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn reads_files_at_the_root() {
        let bytes = zip_with(&[
            ("database.json", r#"{"sites": [{"id": 1, "name": "A"}]}"#),
            ("metadata.json", r#"{"version": "1.0", "tables": ["sites"]}"#),
        ]);
        let archive = read_archive(&bytes, LIMIT).unwrap();
        assert_eq!(archive.database["sites"], json!([{"id": 1, "name": "A"}]));
        assert_eq!(archive.metadata.tables, Some(vec!["sites".to_string()]));
    }

    #[test]
    fn reads_files_one_directory_down() {
        let bytes = zip_with(&[
            ("a-empty/readme.txt", "nothing here"),
            ("backup-2024/database.json", "{}"),
            ("backup-2024/metadata.json", r#"{"exportedAt": "2024-01-01T00:00:00Z"}"#),
        ]);
        let archive = read_archive(&bytes, LIMIT).unwrap();
        assert!(archive.database.is_empty());
        assert!(archive.metadata.exported_at.is_some());
    }

    #[test]
    fn missing_files_and_garbage_are_rejected() {
        let only_db = zip_with(&[("database.json", "{}")]);
        assert!(matches!(read_archive(&only_db, LIMIT), Err(BackupError::MissingFiles)));
        assert!(matches!(
            read_archive(b"definitely not a zip", LIMIT),
            Err(BackupError::Archive(_))
        ));
        let array_db = zip_with(&[("database.json", "[]"), ("metadata.json", "{}")]);
        assert!(matches!(read_archive(&array_db, LIMIT), Err(BackupError::InvalidJson(_))));
    }

    #[test]
    fn written_archives_read_back() {
        let mut database = Map::new();
        database.insert("sites".into(), json!([{"id": 1, "name": "A"}]));
        let archive = BackupArchive {
            database,
            metadata: BackupMetadata {
                exported_at: Some(Utc::now()),
                version: Some("0.3.0".into()),
                tables: Some(vec!["sites".into()]),
            },
        };
        let back = read_archive(&write_archive(&archive).unwrap(), LIMIT).unwrap();
        assert_eq!(back.database, archive.database);
        assert_eq!(back.metadata.version.as_deref(), Some("0.3.0"));
    }

    #[test]
    fn oversized_entries_are_refused_before_parsing() {
        let padding = " ".repeat(64 * 1024);
        let body = format!("{{\"sites\": []{}}}", padding);
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        zip.start_file("database.json", options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
        zip.start_file("metadata.json", options).unwrap();
        zip.write_all(b"{}").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!((bytes.len() as u64) < 4096);

        assert!(matches!(
            read_archive(&bytes, 4096),
            Err(BackupError::EntryTooLarge { ref name, limit: 4096 }) if name == "database.json"
        ));
        assert!(read_archive(&bytes, LIMIT).is_ok());
    }

    #[test]
    fn files_deeper_than_one_folder_are_not_found() {
        let bytes = zip_with(&[
            ("a/b/database.json", "{}"),
            ("a/b/metadata.json", "{}"),
        ]);
        assert!(matches!(read_archive(&bytes, LIMIT), Err(BackupError::MissingFiles)));
    }
}
