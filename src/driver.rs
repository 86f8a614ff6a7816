// src/driver.rs
//! Runs a list of table loads and collects one result per table.

use serde::Serialize;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::error::ErrorKind;
use crate::ingest::{Ingestor, LoadResult, LoadStatus};
use crate::schema::DatasetDescriptor;
use crate::storage::SnapshotStore;

/// Outcomes in the order the datasets were given.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriverReport {
    pub results: Vec<LoadResult>,
}

impl DriverReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &LoadResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &LoadResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(LoadResult::is_success)
    }

    pub fn total_rows(&self) -> u64 {
        self.succeeded().map(|r| r.row_count).sum()
    }

    pub fn log_summary(&self) {
        for r in &self.results {
            match &r.status {
                LoadStatus::Success => info!(
                    table = %r.table_name,
                    rows = r.row_count,
                    rejected = r.rejected_rows,
                    version = r.version,
                    elapsed_ms = r.elapsed_ms,
                    "ok"
                ),
                LoadStatus::Failed { kind, reason } => error!(
                    table = %r.table_name,
                    kind = %kind,
                    elapsed_ms = r.elapsed_ms,
                    "failed: {}",
                    reason
                ),
            }
        }
        info!(
            succeeded = self.succeeded().count(),
            failed = self.failed().count(),
            rows = self.total_rows(),
            "run complete"
        );
    }
}

/// Load each dataset in turn. A failure never stops the tables after it.
pub fn run<S: SnapshotStore>(ingestor: &Ingestor<S>, datasets: &[DatasetDescriptor]) -> DriverReport {
    let results = datasets
        .iter()
        .map(|ds| {
            info!(table = ds.table_name, category = %ds.category, "loading");
            ingestor.load(ds.table_name, &ds.schema, ds.category)
        })
        .collect();
    DriverReport { results }
}

/// Load up to `max_parallel` datasets at once on the blocking pool.
///
/// `max_parallel` is clamped to `1..=datasets.len()`.
///
/// Results keep the order of `datasets`. A worker that panics is reported as
/// an `internal` failure for its own table.
pub async fn run_concurrent<S>(
    ingestor: Arc<Ingestor<S>>,
    datasets: Vec<DatasetDescriptor>,
    max_parallel: usize,
) -> DriverReport
where
    S: SnapshotStore + 'static,
{
    // at most one permit per dataset
    let permits = max_parallel.clamp(1, datasets.len().max(1));
    let semaphore = Arc::new(Semaphore::new(permits));
    let started = Instant::now();

    let handles = datasets.iter().copied().map(|ds| {
        let ingestor = Arc::clone(&ingestor);
        let semaphore = Arc::clone(&semaphore);
        tokio::spawn(async move {
            // the semaphore is never closed
            let _permit = semaphore.acquire_owned().await.ok();
            info!(table = ds.table_name, category = %ds.category, "loading");
            tokio::task::spawn_blocking(move || {
                ingestor.load(ds.table_name, &ds.schema, ds.category)
            })
            .await
        })
    });
    let joined = futures::future::join_all(handles).await;

    let results = datasets
        .iter()
        .zip(joined)
        .map(|(ds, outcome)| match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) | Err(e) => {
                warn!(table = ds.table_name, error = %e, "worker did not finish");
                LoadResult::failed_with(
                    ds.table_name,
                    ds.category,
                    ingestor.destination(ds.table_name, ds.category),
                    ErrorKind::Internal,
                    format!("worker failed: {e}"),
                    elapsed_since(started),
                )
            }
        })
        .collect();
    DriverReport { results }
}

fn elapsed_since(start: Instant) -> Duration {
    Instant::now().saturating_duration_since(start)
}
