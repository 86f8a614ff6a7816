// src/process/mod.rs
pub mod cast;
pub mod date_parser;
pub mod reader;

pub use cast::{cast_cell, BatchBuilder, CastFailure, Cell, RowCaster};
pub use reader::{ColumnMapping, SourceReader};
