use std::sync::Arc;

use arrow::{
    array::{ArrayRef, Date32Builder, Float64Builder, Int32Builder, StringBuilder},
    datatypes::Schema as ArrowSchema,
    error::ArrowError,
    record_batch::RecordBatch,
};
use csv::StringRecord;
use tracing::debug;

use crate::process::date_parser::{days_since_epoch, parse_date};
use crate::process::reader::ColumnMapping;
use crate::schema::{FieldSpec, FieldType, TableSchema};

/// One cast value, already in its Arrow physical form.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i32),
    Double(f64),
    Str(String),
    /// Days since 1970-01-01.
    Date(i32),
}

/// A value that could not be cast into a non-nullable field.
#[derive(Debug, Clone, PartialEq)]
pub struct CastFailure {
    pub field: &'static str,
    pub value: String,
    pub expected: FieldType,
}

enum Parsed {
    Empty,
    Value(Cell),
    Invalid,
}

fn parse_cell(raw: &str, ty: FieldType) -> Parsed {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Parsed::Empty;
    }
    let cell = match ty {
        FieldType::Integer => trimmed.parse::<i32>().ok().map(Cell::Int),
        FieldType::Double => trimmed.parse::<f64>().ok().map(Cell::Double),
        FieldType::Date => parse_date(trimmed).map(|d| Cell::Date(days_since_epoch(d))),
        // strings keep their surrounding whitespace
        FieldType::String => Some(Cell::Str(raw.to_string())),
    };
    cell.map_or(Parsed::Invalid, Parsed::Value)
}

/// Cast one raw field.
///
/// Empty input is "no value" for every type. Nullable fields turn
/// unparseable input into `Cell::Null`; non-nullable fields reject both.
pub fn cast_cell(raw: &str, field: &FieldSpec) -> Result<Cell, CastFailure> {
    match parse_cell(raw, field.field_type) {
        Parsed::Value(cell) => Ok(cell),
        Parsed::Empty | Parsed::Invalid if field.nullable => Ok(Cell::Null),
        Parsed::Empty | Parsed::Invalid => Err(CastFailure {
            field: field.name,
            value: raw.to_string(),
            expected: field.field_type,
        }),
    }
}

/// Casts whole records, reading each schema field from its mapped header position.
pub struct RowCaster<'a> {
    schema: &'a TableSchema,
    mapping: &'a ColumnMapping,
    coerced_nulls: u64,
}

impl<'a> RowCaster<'a> {
    pub fn new(schema: &'a TableSchema, mapping: &'a ColumnMapping) -> Self {
        Self {
            schema,
            mapping,
            coerced_nulls: 0,
        }
    }

    /// Non-empty values that were nulled because they did not parse.
    pub fn coerced_nulls(&self) -> u64 {
        self.coerced_nulls
    }

    /// Cast every field of `record`; the first failure wins and nothing is kept.
    pub fn cast_row(&mut self, record: &StringRecord) -> Result<Vec<Cell>, CastFailure> {
        let mut cells = Vec::with_capacity(self.schema.len());
        for (field, &pos) in self.schema.fields().iter().zip(self.mapping.positions()) {
            let raw = record.get(pos).unwrap_or("");
            let cell = cast_cell(raw, field)?;
            if cell == Cell::Null && !raw.trim().is_empty() {
                self.coerced_nulls += 1;
                debug!(field = field.name, value = raw, "unparseable value nulled");
            }
            cells.push(cell);
        }
        Ok(cells)
    }
}

enum ColumnBuilder {
    Int(Int32Builder),
    Double(Float64Builder),
    Str(StringBuilder),
    Date(Date32Builder),
}

impl ColumnBuilder {
    fn new(ty: FieldType, capacity: usize) -> Self {
        match ty {
            FieldType::Integer => ColumnBuilder::Int(Int32Builder::with_capacity(capacity)),
            FieldType::Double => ColumnBuilder::Double(Float64Builder::with_capacity(capacity)),
            FieldType::String => {
                ColumnBuilder::Str(StringBuilder::with_capacity(capacity, capacity * 16))
            }
            FieldType::Date => ColumnBuilder::Date(Date32Builder::with_capacity(capacity)),
        }
    }

    fn accepts(&self, cell: &Cell) -> bool {
        matches!(
            (self, cell),
            (_, Cell::Null)
                | (ColumnBuilder::Int(_), Cell::Int(_))
                | (ColumnBuilder::Double(_), Cell::Double(_))
                | (ColumnBuilder::Str(_), Cell::Str(_))
                | (ColumnBuilder::Date(_), Cell::Date(_))
        )
    }

    fn append(&mut self, cell: Cell) -> Result<(), ArrowError> {
        match (self, cell) {
            (ColumnBuilder::Int(b), Cell::Null) => b.append_null(),
            (ColumnBuilder::Double(b), Cell::Null) => b.append_null(),
            (ColumnBuilder::Str(b), Cell::Null) => b.append_null(),
            (ColumnBuilder::Date(b), Cell::Null) => b.append_null(),
            (ColumnBuilder::Int(b), Cell::Int(v)) => b.append_value(v),
            (ColumnBuilder::Double(b), Cell::Double(v)) => b.append_value(v),
            (ColumnBuilder::Str(b), Cell::Str(v)) => b.append_value(v),
            (ColumnBuilder::Date(b), Cell::Date(v)) => b.append_value(v),
            (_, cell) => {
                return Err(ArrowError::InvalidArgumentError(format!(
                    "cell {cell:?} does not match its column type"
                )))
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::Int(b) => Arc::new(b.finish()),
            ColumnBuilder::Double(b) => Arc::new(b.finish()),
            ColumnBuilder::Str(b) => Arc::new(b.finish()),
            ColumnBuilder::Date(b) => Arc::new(b.finish()),
        }
    }
}

/// Upper bound on rows reserved up front; builders grow past it on demand.
const PREALLOC_ROWS: usize = 8_192;

/// Accumulates cast rows into Arrow columns, one builder per schema field.
pub struct BatchBuilder {
    arrow_schema: Arc<ArrowSchema>,
    columns: Vec<ColumnBuilder>,
    rows: usize,
}

impl BatchBuilder {
    pub fn new(schema: &TableSchema, arrow_schema: Arc<ArrowSchema>, capacity: usize) -> Self {
        let capacity = capacity.min(PREALLOC_ROWS);
        let columns = schema
            .fields()
            .iter()
            .map(|f| ColumnBuilder::new(f.field_type, capacity))
            .collect();
        Self {
            arrow_schema,
            columns,
            rows: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn push_row(&mut self, cells: Vec<Cell>) -> Result<(), ArrowError> {
        if cells.len() != self.columns.len() {
            return Err(ArrowError::InvalidArgumentError(format!(
                "row has {} cells, expected {}",
                cells.len(),
                self.columns.len()
            )));
        }
        if let Some((idx, cell)) = self
            .columns
            .iter()
            .zip(&cells)
            .position(|(col, cell)| !col.accepts(cell))
            .map(|idx| (idx, &cells[idx]))
        {
            return Err(ArrowError::InvalidArgumentError(format!(
                "cell {cell:?} does not match column {idx}"
            )));
        }
        for (col, cell) in self.columns.iter_mut().zip(cells) {
            col.append(cell)?;
        }
        self.rows += 1;
        Ok(())
    }

    /// Drain the accumulated rows into a RecordBatch; the builder is reusable afterwards.
    pub fn finish(&mut self) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = self.columns.iter_mut().map(ColumnBuilder::finish).collect();
        self.rows = 0;
        RecordBatch::try_new(self.arrow_schema.clone(), arrays)
    }
}
