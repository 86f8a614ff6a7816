//! Snapshot storage.
//!
//! A store owns the on-disk representation of a table snapshot and the
//! guarantee that replacing it is all-or-nothing: readers see either the
//! previous version or the new one, never a mix.

pub mod local;
pub mod manifest;

use arrow::{datatypes::SchemaRef, record_batch::RecordBatch};
use std::path::{Path, PathBuf};

use crate::error::Result;

pub use local::LocalSnapshotStore;
pub use manifest::{ManifestField, SnapshotManifest};

/// Outcome of a committed snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub destination: PathBuf,
    pub version: u64,
    pub row_count: u64,
    pub bytes: u64,
}

/// The current snapshot of a table, fully materialized.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub manifest: SnapshotManifest,
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl Snapshot {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

/// A staged, not yet visible snapshot. Dropping it without `commit` discards it.
pub trait SnapshotWriter: Send {
    fn write(&mut self, batch: &RecordBatch) -> Result<()>;

    fn rows_written(&self) -> u64;

    /// Publish the staged data as the table's new current version.
    fn commit(self: Box<Self>, manifest: SnapshotManifest) -> Result<SnapshotInfo>;
}

pub trait SnapshotStore: Send + Sync {
    /// Start staging a full replacement of the table at `destination`.
    fn begin(&self, destination: &Path, schema: SchemaRef) -> Result<Box<dyn SnapshotWriter>>;

    /// Version currently visible to readers, if any.
    fn current_version(&self, destination: &Path) -> Result<Option<u64>>;

    fn read(&self, destination: &Path) -> Result<Snapshot>;
}
