// src/schema/arrow.rs

use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema};
use std::sync::Arc;

use super::types::{FieldType, TableSchema};

/// Map a declared field type onto its Arrow storage type.
///
/// - Integer → Int32
/// - Double  → Float64
/// - String  → Utf8
/// - Date    → Date32 (days since the Unix epoch)
pub fn map_to_arrow_type(ty: FieldType) -> DataType {
    match ty {
        FieldType::Integer => DataType::Int32,
        FieldType::Double => DataType::Float64,
        FieldType::String => DataType::Utf8,
        FieldType::Date => DataType::Date32,
    }
}

/// Build an ArrowSchema (inside an Arc) from a table schema, keeping field order.
pub fn build_arrow_schema(schema: &TableSchema) -> Arc<ArrowSchema> {
    let fields: Vec<ArrowField> = schema
        .fields()
        .iter()
        .map(|f| ArrowField::new(f.name, map_to_arrow_type(f.field_type), f.nullable))
        .collect();

    Arc::new(ArrowSchema::new(fields))
}
