//! Loads raw CSV extracts into typed, replace-on-load Parquet table snapshots.

pub mod config;
pub mod driver;
pub mod error;
pub mod ingest;
pub mod process;
pub mod schema;
pub mod storage;

pub use config::{Config, LakePaths};
pub use driver::{run, run_concurrent, DriverReport};
pub use error::{ErrorKind, IngestError, Result};
pub use ingest::{Ingestor, LoadReport, LoadResult, LoadStatus, ViolationPolicy};
pub use schema::{Category, DatasetDescriptor, FieldSpec, FieldType, TableSchema};
pub use storage::{LocalSnapshotStore, SnapshotStore};
