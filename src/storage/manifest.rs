use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::error::{IngestError, Result};
use crate::schema::{Category, FieldType, TableSchema};

pub const MANIFEST_FILE: &str = "_snapshot.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub nullable: bool,
}

/// Sidecar describing one committed snapshot version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub table_name: String,
    pub category: Category,
    /// Assigned by the store at commit.
    pub version: u64,
    pub row_count: u64,
    pub rejected_rows: u64,
    pub coerced_nulls: u64,
    pub fields: Vec<ManifestField>,
    /// Source file the snapshot was built from.
    pub source: PathBuf,
    pub committed_at: DateTime<Utc>,
}

impl SnapshotManifest {
    pub fn new(
        table_name: &str,
        category: Category,
        schema: &TableSchema,
        source: impl Into<PathBuf>,
    ) -> Self {
        let fields = schema
            .fields()
            .iter()
            .map(|f| ManifestField {
                name: f.name.to_string(),
                field_type: f.field_type,
                nullable: f.nullable,
            })
            .collect();
        Self {
            table_name: table_name.to_string(),
            category,
            version: 0,
            row_count: 0,
            rejected_rows: 0,
            coerced_nulls: 0,
            fields,
            source: source.into(),
            committed_at: Utc::now(),
        }
    }
}

/// Write `<dir>/_snapshot.json`, pretty-printed with a trailing newline.
pub fn write_manifest(dir: &Path, manifest: &SnapshotManifest) -> Result<()> {
    let path = dir.join(MANIFEST_FILE);
    let mut f = fs::File::create(&path).map_err(|e| IngestError::io(&path, e))?;
    serde_json::to_writer_pretty(&mut f, manifest)?;
    f.write_all(b"\n").map_err(|e| IngestError::io(&path, e))?;
    f.sync_all().map_err(|e| IngestError::io(&path, e))?;
    Ok(())
}

pub fn read_manifest(dir: &Path) -> Result<SnapshotManifest> {
    let path = dir.join(MANIFEST_FILE);
    let f = fs::File::open(&path).map_err(|e| IngestError::io(&path, e))?;
    Ok(serde_json::from_reader(f)?)
}
