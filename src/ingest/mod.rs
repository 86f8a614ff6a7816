// src/ingest/mod.rs
//! The schema-enforced load of one source file into one table snapshot.

mod result;

pub use result::{LoadReport, LoadResult, LoadStatus};

use csv::StringRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr, sync::Arc, time::Instant};
use tracing::{debug, error, info, warn};

use crate::config::{LakePaths, DEFAULT_BATCH_ROWS, MAX_BATCH_ROWS};
use crate::error::{IngestError, Result};
use crate::process::{BatchBuilder, ColumnMapping, RowCaster, SourceReader};
use crate::schema::{build_arrow_schema, Category, TableSchema};
use crate::storage::{LocalSnapshotStore, SnapshotManifest, SnapshotStore};

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("table name pattern"));

/// What to do with a row whose non-nullable field cannot be cast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationPolicy {
    /// Fail the whole load on the first violation.
    #[default]
    #[serde(rename = "strict")]
    Strict,
    /// Drop the row and count it in `rejected_rows`.
    #[serde(rename = "skip")]
    SkipRow,
}

impl fmt::Display for ViolationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViolationPolicy::Strict => "strict",
            ViolationPolicy::SkipRow => "skip",
        })
    }
}

impl FromStr for ViolationPolicy {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ViolationPolicy::Strict),
            "skip" | "skip_row" | "skiprow" => Ok(ViolationPolicy::SkipRow),
            other => Err(IngestError::Config(format!(
                "unknown violation policy {other:?} (expected `strict` or `skip`)"
            ))),
        }
    }
}

pub fn validate_table_name(table_name: &str) -> Result<()> {
    if TABLE_NAME.is_match(table_name) {
        Ok(())
    } else {
        Err(IngestError::InvalidTableName(table_name.to_string()))
    }
}

/// Loads source files into table snapshots.
///
/// Holds no per-load state: every call reads its own source and stages its
/// own snapshot, so one `Ingestor` can serve concurrent loads of different
/// tables.
pub struct Ingestor<S: SnapshotStore = LocalSnapshotStore> {
    paths: LakePaths,
    store: Arc<S>,
    policy: ViolationPolicy,
    batch_rows: usize,
}

impl Ingestor<LocalSnapshotStore> {
    pub fn local(paths: LakePaths) -> Self {
        Self::new(paths, Arc::new(LocalSnapshotStore::new()))
    }
}

impl<S: SnapshotStore> Ingestor<S> {
    pub fn new(paths: LakePaths, store: Arc<S>) -> Self {
        Self {
            paths,
            store,
            policy: ViolationPolicy::Strict,
            batch_rows: DEFAULT_BATCH_ROWS,
        }
    }

    pub fn with_policy(mut self, policy: ViolationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Rows per flushed batch, clamped to `1..=MAX_BATCH_ROWS`.
    pub fn with_batch_rows(mut self, batch_rows: usize) -> Self {
        self.batch_rows = batch_rows.clamp(1, MAX_BATCH_ROWS);
        self
    }

    pub fn paths(&self) -> &LakePaths {
        &self.paths
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn policy(&self) -> ViolationPolicy {
        self.policy
    }

    /// Load `<files_root>/<table_name>.csv` into `<tables_root>/<category>_<table_name>`.
    ///
    /// Never fails: errors are reported through `LoadResult::status`.
    pub fn load(&self, table_name: &str, schema: &TableSchema, category: Category) -> LoadResult {
        let start = Instant::now();
        match self.try_load(table_name, schema, category) {
            Ok(report) => LoadResult::success(report, start.elapsed()),
            Err(err) => {
                error!(table = table_name, kind = %err.kind(), error = %err, "load failed");
                LoadResult::failure(
                    table_name,
                    category,
                    self.paths.table_path(category, table_name),
                    &err,
                    start.elapsed(),
                )
            }
        }
    }

    #[tracing::instrument(level = "info", skip(self, schema, category), fields(category = %category))]
    pub fn try_load(
        &self,
        table_name: &str,
        schema: &TableSchema,
        category: Category,
    ) -> Result<LoadReport> {
        validate_table_name(table_name)?;
        check_schema(table_name, schema)?;

        let source = self.paths.source_path(table_name);
        let mut reader = SourceReader::open(&source)?;
        let mapping = ColumnMapping::resolve(table_name, reader.headers(), schema)?;
        if !mapping.is_identity() {
            debug!("source columns are reordered relative to the schema");
        }

        let destination = self.paths.table_path(category, table_name);
        let arrow_schema = build_arrow_schema(schema);
        let mut writer = self.store.begin(&destination, arrow_schema.clone())?;

        let mut caster = RowCaster::new(schema, &mapping);
        let mut batch = BatchBuilder::new(schema, arrow_schema, self.batch_rows);
        let mut record = StringRecord::new();
        let mut rejected_rows = 0u64;

        while reader.next_record(&mut record)? {
            let cells = match caster.cast_row(&record) {
                Ok(cells) => cells,
                Err(failure) => {
                    let violation = IngestError::SchemaViolation {
                        table_name: table_name.to_string(),
                        line: reader.record_line(&record),
                        field: failure.field.to_string(),
                        value: failure.value,
                        expected: failure.expected,
                    };
                    match self.policy {
                        ViolationPolicy::Strict => return Err(violation),
                        ViolationPolicy::SkipRow => {
                            warn!(error = %violation, "row skipped");
                            rejected_rows += 1;
                            continue;
                        }
                    }
                }
            };
            batch.push_row(cells)?;
            if batch.len() >= self.batch_rows {
                writer.write(&batch.finish()?)?;
            }
        }
        if !batch.is_empty() {
            writer.write(&batch.finish()?)?;
        }

        let mut manifest = SnapshotManifest::new(table_name, category, schema, &source);
        manifest.rejected_rows = rejected_rows;
        manifest.coerced_nulls = caster.coerced_nulls();
        let info = writer.commit(manifest)?;

        info!(
            rows = info.row_count,
            rejected = rejected_rows,
            version = info.version,
            "table loaded"
        );
        Ok(LoadReport {
            table_name: table_name.to_string(),
            category,
            source,
            destination: info.destination,
            version: info.version,
            row_count: info.row_count,
            rejected_rows,
            coerced_nulls: caster.coerced_nulls(),
            bytes: info.bytes,
        })
    }

    /// Destination directory for a table, whether or not it exists yet.
    pub fn destination(&self, table_name: &str, category: Category) -> PathBuf {
        self.paths.table_path(category, table_name)
    }
}

fn check_schema(table_name: &str, schema: &TableSchema) -> Result<()> {
    if schema.is_empty() {
        return Err(IngestError::InvalidSchema {
            table_name: table_name.to_string(),
            reason: "no fields declared".into(),
        });
    }
    let dupes = schema.duplicate_names();
    if !dupes.is_empty() {
        return Err(IngestError::InvalidSchema {
            table_name: table_name.to_string(),
            reason: format!("duplicate fields: {}", dupes.join(", ")),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests;
