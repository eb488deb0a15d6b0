// Schema module for state-serde
//
// Values opting into `@schema` tagging implement `ExportSchema`. The codec never
// validates descriptors; it only stores what the value exports.

pub use self::types::{ExportSchema, JsonSchema, SchemaField, SchemaType};

pub mod types;
