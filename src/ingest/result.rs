use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{ErrorKind, IngestError};
use crate::schema::Category;

/// Details of a committed load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub table_name: String,
    pub category: Category,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub version: u64,
    pub row_count: u64,
    pub rejected_rows: u64,
    pub coerced_nulls: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadStatus {
    Success,
    Failed { kind: ErrorKind, reason: String },
}

/// Per-table outcome, as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadResult {
    pub table_name: String,
    pub category: Category,
    pub destination: PathBuf,
    pub row_count: u64,
    pub rejected_rows: u64,
    /// Snapshot version written by this load; `None` when it failed.
    pub version: Option<u64>,
    pub elapsed_ms: u64,
    pub status: LoadStatus,
}

impl LoadResult {
    pub fn success(report: LoadReport, elapsed: Duration) -> Self {
        Self {
            table_name: report.table_name,
            category: report.category,
            destination: report.destination,
            row_count: report.row_count,
            rejected_rows: report.rejected_rows,
            version: Some(report.version),
            elapsed_ms: elapsed.as_millis() as u64,
            status: LoadStatus::Success,
        }
    }

    pub fn failure(
        table_name: &str,
        category: Category,
        destination: PathBuf,
        err: &IngestError,
        elapsed: Duration,
    ) -> Self {
        Self::failed_with(
            table_name,
            category,
            destination,
            err.kind(),
            err.to_string(),
            elapsed,
        )
    }

    pub fn failed_with(
        table_name: &str,
        category: Category,
        destination: PathBuf,
        kind: ErrorKind,
        reason: String,
        elapsed: Duration,
    ) -> Self {
        Self {
            table_name: table_name.to_string(),
            category,
            destination,
            row_count: 0,
            rejected_rows: 0,
            version: None,
            elapsed_ms: elapsed.as_millis() as u64,
            status: LoadStatus::Failed { kind, reason },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == LoadStatus::Success
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match &self.status {
            LoadStatus::Success => None,
            LoadStatus::Failed { kind, .. } => Some(*kind),
        }
    }
}
