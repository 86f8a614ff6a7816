use arrow::{datatypes::SchemaRef, record_batch::RecordBatch};
use chrono::Utc;
use glob::{glob, Pattern};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::manifest::{read_manifest, write_manifest, SnapshotManifest};
use super::{Snapshot, SnapshotInfo, SnapshotStore, SnapshotWriter};
use crate::error::{IngestError, Result};

const CURRENT_FILE: &str = "_current";
const STAGING_PREFIX: &str = ".staging-";
const PART_FILE: &str = "part-00000.parquet";
const READ_BATCH_ROWS: usize = 8_192;

/// Filesystem snapshot store.
///
/// Layout under a destination directory:
///
/// ```text
/// _current                 "v00000003"
/// v00000003/part-00000.parquet
/// v00000003/_snapshot.json
/// ```
///
/// A load is staged in a `.staging-*` directory, renamed to the next version
/// directory, and published by atomically replacing `_current`. Older
/// versions are removed once the pointer has moved.
#[derive(Debug, Clone)]
pub struct LocalSnapshotStore {
    compression: Compression,
}

impl Default for LocalSnapshotStore {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
        }
    }
}

impl LocalSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compression(compression: Compression) -> Self {
        Self { compression }
    }
}

pub fn version_dir_name(version: u64) -> String {
    format!("v{:08}", version)
}

fn parse_version(name: &str) -> Option<u64> {
    let digits = name.strip_prefix('v')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn read_pointer(destination: &Path) -> Result<Option<u64>> {
    let path = destination.join(CURRENT_FILE);
    let raw = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(IngestError::io(&path, e)),
    };
    parse_version(raw.trim()).map(Some).ok_or_else(|| {
        IngestError::io(
            &path,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad version pointer {:?}", raw.trim()),
            ),
        )
    })
}

/// Publish `version` by writing a temp pointer and renaming it over `_current`.
fn write_pointer(destination: &Path, version: u64) -> Result<()> {
    let tmp = destination.join(format!("{}.tmp", CURRENT_FILE));
    let path = destination.join(CURRENT_FILE);
    {
        let mut f = File::create(&tmp).map_err(|e| IngestError::io(&tmp, e))?;
        writeln!(f, "{}", version_dir_name(version)).map_err(|e| IngestError::io(&tmp, e))?;
        f.sync_all().map_err(|e| IngestError::io(&tmp, e))?;
    }
    fs::rename(&tmp, &path).map_err(|e| IngestError::io(&path, e))
}

/// Remove every version directory except `keep`. Failures are only logged:
/// the new version is already published.
fn remove_superseded(destination: &Path, keep: u64) {
    let entries = match fs::read_dir(destination) {
        Ok(e) => e,
        Err(e) => {
            warn!(dir = %destination.display(), error = %e, "cannot list versions");
            return;
        }
    };
    for entry in entries.filter_map(std::result::Result::ok) {
        let name = entry.file_name();
        let Some(version) = name.to_str().and_then(parse_version) else {
            continue;
        };
        if version == keep {
            continue;
        }
        match fs::remove_dir_all(entry.path()) {
            Ok(()) => debug!(version, "removed superseded snapshot"),
            Err(e) => warn!(version, error = %e, "failed to remove superseded snapshot"),
        }
    }
}

fn part_files(version_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/part-*.parquet",
        Pattern::escape(&version_dir.to_string_lossy())
    );
    let paths = glob(&pattern).map_err(|e| {
        IngestError::io(version_dir, io::Error::new(io::ErrorKind::InvalidInput, e))
    })?;
    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| {
            let p = e.path().to_path_buf();
            IngestError::io(p, e.into())
        })?;
        files.push(path);
    }
    files.sort();
    Ok(files)
}

impl SnapshotStore for LocalSnapshotStore {
    fn begin(&self, destination: &Path, schema: SchemaRef) -> Result<Box<dyn SnapshotWriter>> {
        let created = !destination.exists();
        fs::create_dir_all(destination).map_err(|e| IngestError::io(destination, e))?;
        let guard = FirstLoadGuard {
            destination: destination.to_path_buf(),
            armed: created,
        };
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(destination)
            .map_err(|e| IngestError::io(destination, e))?;

        let part = staging.path().join(PART_FILE);
        let file = File::create(&part).map_err(|e| IngestError::io(&part, e))?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .build();
        let writer = ArrowWriter::try_new(BufWriter::new(file), schema, Some(props))?;

        debug!(staging = %staging.path().display(), "staging snapshot");
        Ok(Box::new(LocalSnapshotWriter {
            destination: destination.to_path_buf(),
            staging,
            writer,
            rows: 0,
            guard,
        }))
    }

    fn current_version(&self, destination: &Path) -> Result<Option<u64>> {
        read_pointer(destination)
    }

    fn read(&self, destination: &Path) -> Result<Snapshot> {
        let version = read_pointer(destination)?.ok_or_else(|| IngestError::SnapshotNotFound {
            path: destination.to_path_buf(),
        })?;
        let dir = destination.join(version_dir_name(version));
        let manifest = read_manifest(&dir)?;

        let mut schema: Option<SchemaRef> = None;
        let mut batches = Vec::new();
        for path in part_files(&dir)? {
            let file = File::open(&path).map_err(|e| IngestError::io(&path, e))?;
            let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
            schema.get_or_insert_with(|| builder.schema().clone());
            let reader = builder.with_batch_size(READ_BATCH_ROWS).build()?;
            for batch in reader {
                batches.push(batch?);
            }
        }
        let schema = schema.ok_or(IngestError::SnapshotNotFound { path: dir })?;

        Ok(Snapshot {
            manifest,
            schema,
            batches,
        })
    }
}

/// Removes a destination directory created by `begin` if the load never
/// commits and nothing else has been put there.
struct FirstLoadGuard {
    destination: PathBuf,
    armed: bool,
}

impl Drop for FirstLoadGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // only succeeds while empty
        if fs::remove_dir(&self.destination).is_ok() {
            debug!(dir = %self.destination.display(), "removed unused destination");
        }
    }
}

struct LocalSnapshotWriter {
    destination: PathBuf,
    /// Removed on drop unless it has been renamed into place.
    staging: TempDir,
    writer: ArrowWriter<BufWriter<File>>,
    rows: u64,
    /// Declared after `staging` so the staging directory is gone when it runs.
    guard: FirstLoadGuard,
}

impl SnapshotWriter for LocalSnapshotWriter {
    fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        self.writer.write(batch)?;
        self.rows += batch.num_rows() as u64;
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.rows
    }

    fn commit(self: Box<Self>, mut manifest: SnapshotManifest) -> Result<SnapshotInfo> {
        // bindings drop in reverse, so `guard` runs after `staging` is gone
        let LocalSnapshotWriter {
            mut guard,
            destination,
            staging,
            writer,
            rows,
        } = *self;

        let part = staging.path().join(PART_FILE);
        let file = writer
            .into_inner()?
            .into_inner()
            .map_err(|e| IngestError::io(&part, e.into_error()))?;
        file.sync_all().map_err(|e| IngestError::io(&part, e))?;
        let bytes = file
            .metadata()
            .map_err(|e| IngestError::io(&part, e))?
            .len();

        let version = read_pointer(&destination)?.map_or(1, |v| v + 1);
        manifest.version = version;
        manifest.row_count = rows;
        manifest.committed_at = Utc::now();
        write_manifest(staging.path(), &manifest)?;

        let version_dir = destination.join(version_dir_name(version));
        if version_dir.exists() {
            // left behind by a commit that never published its pointer
            warn!(dir = %version_dir.display(), "replacing unpublished version directory");
            fs::remove_dir_all(&version_dir).map_err(|e| IngestError::io(&version_dir, e))?;
        }
        fs::rename(staging.path(), &version_dir).map_err(|e| IngestError::io(&version_dir, e))?;
        // the staging path no longer exists; dropping the handle removes nothing
        drop(staging);

        write_pointer(&destination, version)?;
        guard.armed = false;
        remove_superseded(&destination, version);

        info!(
            destination = %destination.display(),
            version,
            rows,
            bytes,
            "snapshot committed"
        );
        Ok(SnapshotInfo {
            destination,
            version,
            row_count: rows,
            bytes,
        })
    }
}
