// src/error.rs

use std::{io, path::PathBuf};

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::FieldType;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Everything that can abort a single table load.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no schema registered for table `{table_name}`")]
    SchemaNotFound { table_name: String },

    #[error("source file not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error(
        "header of `{table_name}` does not match its schema (missing: [{}], unexpected: [{}])",
        missing.join(", "),
        unexpected.join(", ")
    )]
    SchemaMismatch {
        table_name: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error(
        "`{table_name}` line {line}: field `{field}` value {value:?} is not a valid non-null {expected}"
    )]
    SchemaViolation {
        table_name: String,
        line: u64,
        field: String,
        value: String,
        expected: FieldType,
    },

    #[error("no committed snapshot at {}", path.display())]
    SnapshotNotFound { path: PathBuf },

    #[error("invalid schema for `{table_name}`: {reason}")]
    InvalidSchema { table_name: String, reason: String },

    #[error("invalid table name {0:?}")]
    InvalidTableName(String),

    #[error("invalid category {0:?} (expected `fact` or `dim`)")]
    InvalidCategory(String),

    #[error("malformed source {} at line {line}: {source}", path.display())]
    MalformedSource {
        path: PathBuf,
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Arrow(#[from] ArrowError),

    #[error(transparent)]
    Parquet(#[from] ParquetError),

    #[error("snapshot manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("configuration: {0}")]
    Config(String),
}

impl IngestError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::SchemaNotFound { .. } => ErrorKind::SchemaNotFound,
            IngestError::SourceNotFound { .. } => ErrorKind::SourceNotFound,
            IngestError::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            IngestError::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            IngestError::InvalidTableName(_)
            | IngestError::InvalidCategory(_)
            | IngestError::InvalidSchema { .. } => ErrorKind::InvalidInput,
            IngestError::MalformedSource { .. } => ErrorKind::MalformedSource,
            IngestError::SnapshotNotFound { .. }
            | IngestError::Io { .. }
            | IngestError::Arrow(_)
            | IngestError::Parquet(_)
            | IngestError::Manifest(_) => ErrorKind::Storage,
            IngestError::Config(_) => ErrorKind::Config,
        }
    }
}

/// Coarse failure class reported per table by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SchemaNotFound,
    SourceNotFound,
    SchemaMismatch,
    SchemaViolation,
    InvalidInput,
    MalformedSource,
    Storage,
    Config,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SchemaNotFound => "schema_not_found",
            ErrorKind::SourceNotFound => "source_not_found",
            ErrorKind::SchemaMismatch => "schema_mismatch",
            ErrorKind::SchemaViolation => "schema_violation",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::MalformedSource => "malformed_source",
            ErrorKind::Storage => "storage",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
