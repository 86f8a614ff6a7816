use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use lakeload::{LocalSnapshotStore, SnapshotStore};
use std::{env, path::Path, process::exit};

const PREVIEW_ROWS: usize = 10;

fn main() {
    // Expect exactly one CLI argument: a table directory such as Tables/fact_sales.
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <TABLE_DIR>", args[0]);
        exit(1);
    }
    if let Err(e) = inspect_snapshot(Path::new(&args[1])) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

/// Resolve the current version of a table and print its manifest, schema and first rows.
fn inspect_snapshot(dir: &Path) -> Result<()> {
    let store = LocalSnapshotStore::new();
    let snap = store
        .read(dir)
        .with_context(|| format!("reading snapshot at {}", dir.display()))?;
    let m = &snap.manifest;

    println!("=== Table: {}_{} ===", m.category, m.table_name);
    println!("Version:        {}", m.version);
    println!("Committed at:   {}", m.committed_at.to_rfc3339());
    println!("Source:         {}", m.source.display());
    println!("Rows:           {}", m.row_count);
    println!("Rejected rows:  {}", m.rejected_rows);
    println!("Coerced nulls:  {}", m.coerced_nulls);
    println!();

    println!("=== Columns ===");
    for field in snap.schema.fields() {
        let declared = m
            .fields
            .iter()
            .find(|f| f.name == *field.name())
            .map_or("<undeclared>".to_string(), |f| f.field_type.to_string());
        println!(
            "- {:<20} | Arrow: {:<8} | Declared: {:<8} | Nullable: {}",
            field.name(),
            field.data_type().to_string(),
            declared,
            field.is_nullable()
        );
    }
    println!();

    // first PREVIEW_ROWS rows across batches
    let mut preview = Vec::new();
    let mut remaining = PREVIEW_ROWS;
    for batch in &snap.batches {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(batch.num_rows());
        preview.push(batch.slice(0, take));
        remaining -= take;
    }
    println!("=== First {} rows ===", PREVIEW_ROWS.min(snap.num_rows()));
    println!("{}", pretty_format_batches(&preview)?);
    Ok(())
}
