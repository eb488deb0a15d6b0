// Schema type system for state-serde
//
// Schema values are opaque leaves to the codec: only the descriptor they export
// is stored. This module defines the capability trait and two implementations.

use std::fmt::Debug;

use serde_json::{json, Map, Value as JsonValue};

use crate::internal::error::{Error, Result};

/// Capability implemented by values that can export themselves as a
/// JSON-schema-like descriptor.
///
/// Any value implementing this trait is stored under the `@schema` tag.
/// Deserialization yields the descriptor, not the original value.
pub trait ExportSchema: Debug + Send + Sync {
    /// Exports the descriptor for this schema.
    fn to_json_schema(&self) -> Result<JsonValue>;
}

/// Represents the data types supported in a schema descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaType {
    /// Null type
    Null,
    /// Boolean type
    Boolean,
    /// Integral number
    Integer,
    /// Any number
    Number,
    /// UTF-8 encoded string
    String,
    /// Array of items with the same type
    Array(Box<SchemaType>),
    /// Object with named fields
    Object(Vec<SchemaField>),
    /// Union of multiple possible types
    Union(Vec<SchemaType>),
}

impl SchemaType {
    fn descriptor(&self) -> Result<JsonValue> {
        let descriptor = match self {
            SchemaType::Null => json!({ "type": "null" }),
            SchemaType::Boolean => json!({ "type": "boolean" }),
            SchemaType::Integer => json!({ "type": "integer" }),
            SchemaType::Number => json!({ "type": "number" }),
            SchemaType::String => json!({ "type": "string" }),
            SchemaType::Array(items) => json!({
                "type": "array",
                "items": items.descriptor()?,
            }),
            SchemaType::Object(fields) => {
                let mut properties = Map::new();
                let mut required = Vec::new();
                for field in fields {
                    if properties.contains_key(&field.name) {
                        return Err(Error::SchemaError(format!(
                            "Duplicate field '{}' in object schema",
                            field.name
                        )));
                    }
                    let mut property = field.field_type.descriptor()?;
                    if let (Some(description), JsonValue::Object(obj)) =
                        (&field.description, &mut property)
                    {
                        obj.insert("description".to_string(), json!(description));
                    }
                    properties.insert(field.name.clone(), property);
                    if field.required {
                        required.push(JsonValue::String(field.name.clone()));
                    }
                }
                let mut obj = Map::new();
                obj.insert("type".to_string(), json!("object"));
                obj.insert("properties".to_string(), JsonValue::Object(properties));
                if !required.is_empty() {
                    obj.insert("required".to_string(), JsonValue::Array(required));
                }
                JsonValue::Object(obj)
            }
            SchemaType::Union(types) => {
                if types.is_empty() {
                    return Err(Error::SchemaError("Union schema has no members".to_string()));
                }
                let any_of = types
                    .iter()
                    .map(|t| t.descriptor())
                    .collect::<Result<Vec<_>>>()?;
                json!({ "anyOf": any_of })
            }
        };
        Ok(descriptor)
    }
}

impl ExportSchema for SchemaType {
    fn to_json_schema(&self) -> Result<JsonValue> {
        self.descriptor()
    }
}

/// Represents a field in an object schema
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: SchemaType,
    /// Whether the field is required
    pub required: bool,
    /// Field description
    pub description: Option<String>,
}

impl SchemaField {
    /// Creates a required field.
    pub fn required(name: impl Into<String>, field_type: SchemaType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            description: None,
        }
    }

    /// Creates an optional field.
    pub fn optional(name: impl Into<String>, field_type: SchemaType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A schema whose descriptor was produced elsewhere (e.g. loaded from disk).
#[derive(Debug, Clone, PartialEq)]
pub struct JsonSchema(pub JsonValue);

impl ExportSchema for JsonSchema {
    fn to_json_schema(&self) -> Result<JsonValue> {
        Ok(self.0.clone())
    }
}
