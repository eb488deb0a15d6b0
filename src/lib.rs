//! Persistence codec for resource state trees.
//!
//! Converts an in-memory [`Value`] tree (containers, scalars, dates, schema
//! values and secrets) into a JSON-safe [`Envelope`] tree and back. Secrets are
//! encrypted with a password taken from the [`Scope`] passed to every call.

pub mod codec;
pub mod encrypt;
pub mod internal;
pub mod schema;
pub mod scope;
pub mod state_serde;

pub use codec::encode::SerializeOptions;
pub use codec::envelope::{Envelope, DATE_TAG, SCHEMA_TAG, SECRET_TAG};
pub use codec::types::{Field, Secret, Value, ValueKind};
pub use encrypt::{CodecConfig, EncryptionStrategy, SecretCodec};
pub use internal::error::{Error, Result};
pub use schema::{ExportSchema, JsonSchema, SchemaField, SchemaType};
pub use scope::Scope;
pub use state_serde::StateSerde;

/// Serializes `value` with the default AES-GCM codec.
pub async fn serialize(
    scope: &Scope,
    value: &Value,
    options: SerializeOptions,
) -> Result<Option<Envelope>> {
    StateSerde::default().serialize(scope, value, options).await
}

/// Deserializes `envelope` with the default AES-GCM codec.
pub async fn deserialize(scope: &Scope, envelope: &Envelope) -> Result<Value> {
    StateSerde::default().deserialize(scope, envelope).await
}
