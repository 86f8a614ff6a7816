use anyhow::{Context, Result};
use lakeload::{driver, Config, Ingestor};
use std::{process::ExitCode, sync::Arc};
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();
    info!("startup");

    // ─── 2) configuration ────────────────────────────────────────────
    let cfg = Config::load().context("loading configuration")?;
    let paths = cfg.paths();
    info!(
        lakehouse = %cfg.onelake_uri(),
        root = %paths.root().display(),
        policy = %cfg.on_violation,
        "configured"
    );
    let datasets = cfg.datasets().context("resolving table list")?;

    // ─── 3) load every table ─────────────────────────────────────────
    let ingestor = Ingestor::local(paths)
        .with_policy(cfg.on_violation)
        .with_batch_rows(cfg.batch_rows);
    let start = Instant::now();
    let report = if cfg.concurrency > 1 {
        driver::run_concurrent(Arc::new(ingestor), datasets, cfg.concurrency).await
    } else {
        tokio::task::spawn_blocking(move || driver::run(&ingestor, &datasets))
            .await
            .context("driver task")?
    };
    info!(elapsed = ?start.elapsed(), "all tables attempted");

    // ─── 4) report ───────────────────────────────────────────────────
    report.log_summary();
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serializing report")?
    );

    Ok(if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
