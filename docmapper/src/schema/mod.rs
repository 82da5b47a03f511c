mod parser;
mod registry;
mod types;

pub use parser::{parse_schema, parse_schema_str};
pub use registry::{Schema, SchemaOptions, CREATED_AT, UPDATED_AT};
pub use types::{
    AutoIdStrategy, FieldSpec, FieldType, IdConfig, ModelDefinition, SchemaDefinition,
};
