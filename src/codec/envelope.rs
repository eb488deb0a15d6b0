// Envelope: the JSON-safe tagged representation produced by serialization
//
// Three reserved single-key object shapes carry type tags:
//   {"@secret": "<ciphertext or plaintext>"}
//   {"@schema": <descriptor>}
//   {"@date": "<ISO-8601 timestamp>"}
// Everything else maps one to one onto JSON.

use std::future::Future;

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::internal::error::{Error, Result};

pub const SECRET_TAG: &str = "@secret";
pub const SCHEMA_TAG: &str = "@schema";
pub const DATE_TAG: &str = "@date";

/// Reserved keys, in the order they are recognised.
pub const RESERVED_TAGS: [&str; 3] = [SECRET_TAG, SCHEMA_TAG, DATE_TAG];

/// Represents a node of a serialized (storable) tree.
#[derive(Debug, PartialEq, Clone)]
pub enum Envelope {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<Envelope>),
    /// Ordered key/value pairs
    Object(Vec<(String, Envelope)>),
    /// Ciphertext, or raw plaintext when serialized with `encrypt: false`
    Secret(String),
    /// Exported schema descriptor
    Schema(JsonValue),
    /// ISO-8601 timestamp
    Date(String),
}

impl Envelope {
    /// Converts the envelope into its JSON wire form.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Envelope::Null => JsonValue::Null,
            Envelope::Bool(b) => JsonValue::Bool(*b),
            Envelope::Number(n) => JsonValue::Number(n.clone()),
            Envelope::String(s) => JsonValue::String(s.clone()),
            Envelope::Array(items) => JsonValue::Array(items.iter().map(Envelope::to_json).collect()),
            Envelope::Object(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            Envelope::Secret(payload) => tagged(SECRET_TAG, JsonValue::String(payload.clone())),
            Envelope::Schema(descriptor) => tagged(SCHEMA_TAG, descriptor.clone()),
            Envelope::Date(timestamp) => tagged(DATE_TAG, JsonValue::String(timestamp.clone())),
        }
    }

    /// Parses the JSON wire form, recognising reserved tag keys.
    ///
    /// An object carrying more than one reserved key is rejected. A `@secret`
    /// key whose value is not a string does not mark a secret; such an object
    /// is read as a plain mapping.
    pub fn from_json(json: JsonValue) -> Result<Self> {
        match json {
            JsonValue::Null => Ok(Envelope::Null),
            JsonValue::Bool(b) => Ok(Envelope::Bool(b)),
            JsonValue::Number(n) => Ok(Envelope::Number(n)),
            JsonValue::String(s) => Ok(Envelope::String(s)),
            JsonValue::Array(items) => Ok(Envelope::Array(
                items
                    .into_iter()
                    .map(Envelope::from_json)
                    .collect::<Result<Vec<_>>>()?,
            )),
            JsonValue::Object(map) => Self::from_json_object(map),
        }
    }

    fn from_json_object(mut map: Map<String, JsonValue>) -> Result<Self> {
        let tags: Vec<&str> = RESERVED_TAGS
            .iter()
            .copied()
            .filter(|tag| map.contains_key(*tag))
            .collect();
        if tags.len() > 1 {
            return Err(Error::CodecError(format!(
                "Envelope carries more than one reserved key: {}",
                tags.join(", ")
            )));
        }
        if map.len() > 1 && !tags.is_empty() {
            log::warn!("Ignoring extra keys next to reserved key {}", tags[0]);
        }

        if matches!(map.get(SECRET_TAG), Some(JsonValue::String(_))) {
            if let Some(JsonValue::String(payload)) = map.remove(SECRET_TAG) {
                return Ok(Envelope::Secret(payload));
            }
        }
        if let Some(descriptor) = map.remove(SCHEMA_TAG) {
            return Ok(Envelope::Schema(descriptor));
        }
        if let Some(timestamp) = map.remove(DATE_TAG) {
            return match timestamp {
                JsonValue::String(timestamp) => Ok(Envelope::Date(timestamp)),
                other => Err(Error::CodecError(format!(
                    "Expected {} to hold a timestamp string, got {}",
                    DATE_TAG, other
                ))),
            };
        }

        let fields = map
            .into_iter()
            .map(|(key, value)| -> Result<(String, Envelope)> {
                Ok((key, Envelope::from_json(value)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Envelope::Object(fields))
    }

    /// Renders the envelope as compact JSON text.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Renders the envelope as indented JSON text.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses envelope JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: JsonValue = serde_json::from_str(text)?;
        Envelope::from_json(json)
    }

    /// Rewrites every secret payload with `f`, concurrently, keeping every
    /// other node (schemas and dates included) as it is.
    pub fn map_secrets<'a, F, Fut>(&'a self, f: &'a F) -> BoxFuture<'a, Result<Envelope>>
    where
        F: Fn(String) -> Fut + Sync + 'a,
        Fut: Future<Output = Result<String>> + Send + 'a,
    {
        map_secrets_node(self, f).boxed()
    }

    /// Visits every node depth-first, parents before children.
    pub fn walk<F: FnMut(&Envelope)>(&self, f: &mut F) {
        f(self);
        match self {
            Envelope::Array(items) => items.iter().for_each(|item| item.walk(f)),
            Envelope::Object(fields) => fields.iter().for_each(|(_, value)| value.walk(f)),
            _ => {}
        }
    }
}

async fn map_secrets_node<'a, F, Fut>(envelope: &'a Envelope, f: &'a F) -> Result<Envelope>
where
    F: Fn(String) -> Fut + Sync + 'a,
    Fut: Future<Output = Result<String>> + Send + 'a,
{
    let mapped = match envelope {
        Envelope::Secret(payload) => Envelope::Secret(f(payload.clone()).await?),
        Envelope::Array(items) => {
            Envelope::Array(try_join_all(items.iter().map(|item| item.map_secrets(f))).await?)
        }
        Envelope::Object(fields) => {
            let values = try_join_all(fields.iter().map(|(_, value)| value.map_secrets(f))).await?;
            Envelope::Object(
                fields
                    .iter()
                    .zip(values)
                    .map(|((key, _), value)| (key.clone(), value))
                    .collect(),
            )
        }
        other => other.clone(),
    };
    Ok(mapped)
}

fn tagged(tag: &str, value: JsonValue) -> JsonValue {
    let mut map = Map::with_capacity(1);
    map.insert(tag.to_string(), value);
    JsonValue::Object(map)
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = JsonValue::deserialize(deserializer)?;
        Envelope::from_json(json).map_err(D::Error::custom)
    }
}
