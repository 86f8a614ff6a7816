pub mod arrow;
pub mod registry;
pub mod types;

pub use arrow::{build_arrow_schema, map_to_arrow_type};
pub use registry::{default_datasets, descriptor, get_schema, registered};
pub use types::{Category, DatasetDescriptor, FieldSpec, FieldType, TableSchema};
