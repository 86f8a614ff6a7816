use super::*;
use crate::error::ErrorKind;
use crate::schema::{get_schema, FieldSpec, FieldType};
use arrow::array::{Array, Date32Array, Float64Array, Int32Array, StringArray};
use std::fs;
use tempfile::{tempdir, TempDir};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const SALES_HEADER: &str = "OrderKey,LineNumber,OrderDate,DeliveryDate,CustomerKey,StoreKey,ProductKey,Quantity,UnitPrice,NetPrice,UnitCost,CurrencyCode,ExchangeRate";

static KEYED: TableSchema = TableSchema {
    fields: &[
        FieldSpec::required("Id", FieldType::Integer),
        FieldSpec::nullable("Name", FieldType::String),
        FieldSpec::nullable("Score", FieldType::Double),
    ],
};

fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,lakeload::ingest=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn lake() -> (TempDir, Ingestor) {
    let dir = tempdir().unwrap();
    let ingestor = Ingestor::local(LakePaths::new(dir.path()));
    (dir, ingestor)
}

fn put_source(ingestor: &Ingestor, table_name: &str, body: &str) {
    let root = ingestor.paths().files_root();
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join(format!("{table_name}.csv")), body).unwrap();
}

fn ints(batch: &arrow::record_batch::RecordBatch, idx: usize) -> Vec<Option<i32>> {
    let col = batch.column(idx).as_any().downcast_ref::<Int32Array>().unwrap();
    col.iter().collect()
}

#[test]
fn sales_row_lands_typed() -> anyhow::Result<()> {
    init_test_logging();
    let (_dir, ingestor) = lake();
    put_source(
        &ingestor,
        "sales",
        &format!("{SALES_HEADER}\n1,1,2020-01-01,2020-01-05,100,1,50,2,19.99,18.00,12.00,USD,1.0\n"),
    );

    let report = ingestor.try_load("sales", get_schema("sales")?, Category::Fact)?;
    assert_eq!(report.row_count, 1);
    assert_eq!(report.version, 1);
    assert!(report.destination.ends_with("Tables/fact_sales"));

    let snap = ingestor.store().read(&report.destination)?;
    assert_eq!(snap.num_rows(), 1);
    let batch = &snap.batches[0];
    assert_eq!(batch.num_columns(), 13);
    assert_eq!(ints(batch, 0), vec![Some(1)]);

    let order_date = batch.column(2).as_any().downcast_ref::<Date32Array>().unwrap();
    assert_eq!(order_date.value(0), 18_262); // 2020-01-01
    let unit_price = batch.column(8).as_any().downcast_ref::<Float64Array>().unwrap();
    assert_eq!(unit_price.value(0), 19.99);
    let currency = batch.column(11).as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(currency.value(0), "USD");
    Ok(())
}

#[test]
fn stored_schema_matches_declared_schema() -> anyhow::Result<()> {
    let (_dir, ingestor) = lake();
    put_source(&ingestor, "currencyexchange", "Date,FromCurrency,ToCurrency,Exchange\n");
    let schema = get_schema("currencyexchange")?;
    let report = ingestor.try_load("currencyexchange", schema, Category::Fact)?;
    assert_eq!(report.row_count, 0);

    let snap = ingestor.store().read(&report.destination)?;
    assert_eq!(snap.schema.fields(), build_arrow_schema(schema).fields());
    assert_eq!(snap.manifest.fields.len(), 4);
    assert_eq!(snap.manifest.table_name, "currencyexchange");
    Ok(())
}

#[test]
fn reload_replaces_instead_of_appending() -> anyhow::Result<()> {
    init_test_logging();
    let (_dir, ingestor) = lake();
    put_source(&ingestor, "keyed", "Id,Name,Score\n1,a,0.5\n2,b,\n");

    let first = ingestor.try_load("keyed", &KEYED, Category::Dim)?;
    let before = ingestor.store().read(&first.destination)?;
    let first_bytes = fs::read(first.destination.join("v00000001/part-00000.parquet"))?;
    let second = ingestor.try_load("keyed", &KEYED, Category::Dim)?;
    let after = ingestor.store().read(&second.destination)?;

    assert_eq!((first.version, second.version), (1, 2));
    assert_eq!(after.num_rows(), 2);
    assert_eq!(before.batches, after.batches);
    assert!(!first.destination.join("v00000001").exists());
    let second_bytes = fs::read(second.destination.join("v00000002/part-00000.parquet"))?;
    assert_eq!(first_bytes, second_bytes);
    Ok(())
}

#[test]
fn header_order_does_not_matter() -> anyhow::Result<()> {
    let (_ordered_dir, ordered) = lake();
    let (_shuffled_dir, shuffled) = lake();
    put_source(&ordered, "keyed", "Id,Name,Score\n7,x,1.5\n8,,\n");
    put_source(&shuffled, "keyed", "Score,Id,Name\n1.5,7,x\n,8,\n");

    let a = ordered.try_load("keyed", &KEYED, Category::Dim)?;
    let b = shuffled.try_load("keyed", &KEYED, Category::Dim)?;
    let a = ordered.store().read(&a.destination)?;
    let b = shuffled.store().read(&b.destination)?;

    assert_eq!(a.schema.fields(), b.schema.fields());
    assert_eq!(a.batches, b.batches);
    assert_eq!(ints(&b.batches[0], 0), vec![Some(7), Some(8)]);
    Ok(())
}

#[test]
fn missing_or_extra_columns_are_rejected() {
    let (_dir, ingestor) = lake();
    for body in ["Id,Name\n1,a\n", "Id,Name,Score,Extra\n1,a,2.0,z\n"] {
        put_source(&ingestor, "keyed", body);
        let err = ingestor.try_load("keyed", &KEYED, Category::Dim).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch, "{body:?}: {err}");
    }
    let dest = ingestor.destination("keyed", Category::Dim);
    assert_eq!(ingestor.store().current_version(&dest).unwrap(), None);
}

#[test]
fn strict_violation_keeps_previous_snapshot() -> anyhow::Result<()> {
    init_test_logging();
    let (_dir, ingestor) = lake();
    put_source(&ingestor, "keyed", "Id,Name,Score\n1,a,0.5\n");
    ingestor.try_load("keyed", &KEYED, Category::Dim)?;

    put_source(&ingestor, "keyed", "Id,Name,Score\n2,b,1.0\nnot-a-number,c,2.0\n");
    let err = ingestor.try_load("keyed", &KEYED, Category::Dim).unwrap_err();
    match &err {
        IngestError::SchemaViolation { field, value, line, .. } => {
            assert_eq!(field, "Id");
            assert_eq!(value, "not-a-number");
            assert_eq!(*line, 3);
        }
        other => panic!("unexpected error: {other}"),
    }

    let dest = ingestor.destination("keyed", Category::Dim);
    assert_eq!(ingestor.store().current_version(&dest)?, Some(1));
    let snap = ingestor.store().read(&dest)?;
    assert_eq!(ints(&snap.batches[0], 0), vec![Some(1)]);
    Ok(())
}

#[test]
fn crlf_violation_reports_the_same_line() -> anyhow::Result<()> {
    let (_dir, ingestor) = lake();
    for body in [
        "Id,Name,Score\n1,a,0.5\nbad,b,1.0\n",
        "Id,Name,Score\r\n1,a,0.5\r\nbad,b,1.0\r\n",
    ] {
        put_source(&ingestor, "keyed", body);
        match ingestor.try_load("keyed", &KEYED, Category::Dim) {
            Err(IngestError::SchemaViolation { line, value, .. }) => {
                assert_eq!(value, "bad");
                assert_eq!(line, 3, "{body:?}");
            }
            other => panic!("expected SchemaViolation, got {other:?}"),
        }
    }
    Ok(())
}

#[test]
fn failed_first_load_leaves_no_table_directory() {
    let (_dir, ingestor) = lake();
    put_source(&ingestor, "keyed", "Id,Name,Score\n1,a,0.5\n2,b\n");
    let err = ingestor.try_load("keyed", &KEYED, Category::Dim).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedSource);

    put_source(&ingestor, "keyed", "Id,Name,Score\n,a,0.5\n");
    let err = ingestor.try_load("keyed", &KEYED, Category::Dim).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);

    assert!(!ingestor.destination("keyed", Category::Dim).exists());
}

#[test]
fn invalid_utf8_is_malformed_source() {
    let (_dir, ingestor) = lake();
    let root = ingestor.paths().files_root();
    fs::create_dir_all(&root).unwrap();
    fs::write(
        root.join("keyed.csv"),
        b"Id,Name,Score\n1,a,0.5\n2,b\xff\xfe,1.0\n".as_slice(),
    )
    .unwrap();

    let err = ingestor.try_load("keyed", &KEYED, Category::Dim).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedSource);
    assert!(matches!(err, IngestError::MalformedSource { line: 3, .. }), "{err}");
}

#[test]
fn oversized_batch_rows_are_clamped() -> anyhow::Result<()> {
    let (_dir, ingestor) = lake();
    let ingestor = ingestor.with_batch_rows(1 << 40);
    put_source(&ingestor, "keyed", "Id,Name,Score\n1,a,0.5\n2,b,1.5\n");
    let report = ingestor.try_load("keyed", &KEYED, Category::Dim)?;
    assert_eq!(report.row_count, 2);
    Ok(())
}

#[test]
fn skip_policy_counts_rejected_rows() -> anyhow::Result<()> {
    let (_dir, ingestor) = lake();
    let ingestor = ingestor.with_policy(ViolationPolicy::SkipRow);
    put_source(&ingestor, "keyed", "Id,Name,Score\n1,a,x\n,b,1.0\n3,c,2.0\n");

    let report = ingestor.try_load("keyed", &KEYED, Category::Dim)?;
    assert_eq!(report.row_count, 2);
    assert_eq!(report.rejected_rows, 1);
    // "x" in the nullable Score column
    assert_eq!(report.coerced_nulls, 1);

    let snap = ingestor.store().read(&report.destination)?;
    assert_eq!(snap.manifest.rejected_rows, 1);
    assert_eq!(ints(&snap.batches[0], 0), vec![Some(1), Some(3)]);
    Ok(())
}

#[test]
fn small_batches_still_make_one_snapshot() -> anyhow::Result<()> {
    let (_dir, ingestor) = lake();
    let ingestor = ingestor.with_batch_rows(2);
    let mut body = String::from("Id,Name,Score\n");
    for i in 0..5 {
        body.push_str(&format!("{i},n{i},{i}.5\n"));
    }
    put_source(&ingestor, "keyed", &body);

    let report = ingestor.try_load("keyed", &KEYED, Category::Dim)?;
    assert_eq!(report.row_count, 5);
    let snap = ingestor.store().read(&report.destination)?;
    assert_eq!(snap.num_rows(), 5);
    Ok(())
}

#[test]
fn bad_names_and_missing_sources() {
    let (_dir, ingestor) = lake();
    for name in ["", "../escape", "a b", "sales.csv"] {
        let err = ingestor.try_load(name, &KEYED, Category::Fact).unwrap_err();
        assert!(matches!(err, IngestError::InvalidTableName(_)), "{name:?}");
    }

    let result = ingestor.load("keyed", &KEYED, Category::Dim);
    assert!(!result.is_success());
    assert_eq!(result.failure_kind(), Some(ErrorKind::SourceNotFound));
    assert_eq!(result.version, None);
    assert!(!result.destination.exists());
}

#[test]
fn empty_schema_is_invalid() {
    static EMPTY: TableSchema = TableSchema { fields: &[] };
    let (_dir, ingestor) = lake();
    let err = ingestor.try_load("keyed", &EMPTY, Category::Dim).unwrap_err();
    assert!(matches!(err, IngestError::InvalidSchema { .. }));
}

#[test]
fn violation_policy_parses() {
    assert_eq!("Strict".parse::<ViolationPolicy>().unwrap(), ViolationPolicy::Strict);
    assert_eq!("skip".parse::<ViolationPolicy>().unwrap(), ViolationPolicy::SkipRow);
    assert!("lenient".parse::<ViolationPolicy>().is_err());
    assert_eq!(ViolationPolicy::SkipRow.to_string(), "skip");
}

#[test]
fn load_result_serializes_status() -> anyhow::Result<()> {
    let (_dir, ingestor) = lake();
    put_source(&ingestor, "keyed", "Id,Name,Score\n1,a,0.5\n");
    let ok = ingestor.load("keyed", &KEYED, Category::Dim);
    let json = serde_json::to_value(&ok)?;
    assert_eq!(json["status"]["state"], "success");
    assert_eq!(json["category"], "dim");
    assert_eq!(json["version"], 1);

    let failed = ingestor.load("nope", &KEYED, Category::Dim);
    let json = serde_json::to_value(&failed)?;
    assert_eq!(json["status"]["state"], "failed");
    assert_eq!(json["status"]["kind"], "source_not_found");
    Ok(())
}
