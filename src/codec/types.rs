use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::schema::ExportSchema;
use crate::scope::Scope;

/// A sensitive string payload that must be encrypted before it is stored.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    pub unencrypted: String,
}

impl Secret {
    pub fn new(unencrypted: impl Into<String>) -> Self {
        Self {
            unencrypted: unencrypted.into(),
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// A single key/value entry of an object.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: Value,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Field {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A node of an in-memory value tree.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<Value>),
    /// Ordered fields. Keys should be unique; when built directly with a
    /// repeated key, serialization keeps the first position and the last value,
    /// as `insert` would.
    Object(Vec<Field>),
    Secret(Secret),
    Schema(Arc<dyn ExportSchema>),
    Date(DateTime<Utc>),
    /// Process context; never persisted
    Scope(Arc<Scope>),
}

/// Discriminant of a `Value`, used for logging and assertions.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
    Secret,
    Schema,
    Date,
    Scope,
}

impl Value {
    /// Returns the corresponding ValueKind for the Value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
            Value::Secret(_) => ValueKind::Secret,
            Value::Schema(_) => ValueKind::Schema,
            Value::Date(_) => ValueKind::Date,
            Value::Scope(_) => ValueKind::Scope,
        }
    }

    /// An empty object.
    pub fn object() -> Self {
        Value::Object(Vec::new())
    }

    pub fn schema(schema: impl ExportSchema + 'static) -> Self {
        Value::Schema(Arc::new(schema))
    }

    /// Inserts a field, replacing the value of an existing key in place so
    /// that keys stay unique and keep their original position.
    ///
    /// Does nothing if `self` is not an object.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if let Value::Object(fields) = self {
            let key = key.into();
            let value = value.into();
            match fields.iter_mut().find(|f| f.key == key) {
                Some(field) => field.value = value,
                None => fields.push(Field { key, value }),
            }
        }
    }

    /// Builder form of `insert`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Looks up a field of an object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.iter().find(|f| f.key == key).map(|f| &f.value),
            _ => None,
        }
    }

    pub fn as_secret(&self) -> Option<&Secret> {
        match self {
            Value::Secret(secret) => Some(secret),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(date) => Some(date),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Secret(a), Value::Secret(b)) => a == b,
            (Value::Schema(a), Value::Schema(b)) => {
                match (a.to_json_schema(), b.to_json_schema()) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => false,
                }
            }
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Scope(a), Value::Scope(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => Value::Number(n),
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| Field { key, value: value.into() })
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

/// Non-finite floats have no JSON representation and become `Null`.
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Secret> for Value {
    fn from(secret: Secret) -> Self {
        Value::Secret(secret)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(date: DateTime<Utc>) -> Self {
        Value::Date(date)
    }
}

impl From<Arc<Scope>> for Value {
    fn from(scope: Arc<Scope>) -> Self {
        Value::Scope(scope)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
