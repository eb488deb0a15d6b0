// StateSerde: a codec-owning handle over the serialize/deserialize pair
//
// Storage callers hold one `StateSerde` for the lifetime of the process and pass
// the scope explicitly on every call.

use std::sync::Arc;

use crate::codec::decode;
use crate::codec::encode::{self, SerializeOptions};
use crate::codec::envelope::Envelope;
use crate::codec::types::Value;
use crate::encrypt::{get_codec_with_config, CodecConfig, SecretCodec};
use crate::internal::error::{Error, Result};
use crate::scope::Scope;

/// Persistence codec for value trees.
#[derive(Debug, Clone)]
pub struct StateSerde {
    codec: Arc<dyn SecretCodec>,
}

impl StateSerde {
    /// Creates a StateSerde using the given secret codec.
    pub fn new(codec: Arc<dyn SecretCodec>) -> Self {
        Self { codec }
    }

    /// Creates a StateSerde with the codec selected by `config`.
    pub fn with_config(config: &CodecConfig) -> Self {
        log::debug!("Using {:?} secret codec", config.strategy);
        Self::new(get_codec_with_config(config))
    }

    pub fn codec(&self) -> &Arc<dyn SecretCodec> {
        &self.codec
    }

    /// Serializes `value`. Returns `None` if the value is a scope.
    pub async fn serialize(
        &self,
        scope: &Scope,
        value: &Value,
        options: SerializeOptions,
    ) -> Result<Option<Envelope>> {
        encode::serialize(self.codec.as_ref(), scope, value, options).await
    }

    /// Deserializes an envelope produced by `serialize`.
    pub async fn deserialize(&self, scope: &Scope, envelope: &Envelope) -> Result<Value> {
        decode::deserialize(self.codec.as_ref(), scope, envelope).await
    }

    /// Serializes `value` straight to JSON text for storage.
    pub async fn serialize_to_string(
        &self,
        scope: &Scope,
        value: &Value,
        options: SerializeOptions,
    ) -> Result<String> {
        match self.serialize(scope, value, options).await? {
            Some(envelope) => envelope.to_json_string(),
            None => Err(Error::CodecError(
                "Value has no persistable representation".to_string(),
            )),
        }
    }

    /// Parses stored JSON text and deserializes it.
    pub async fn deserialize_from_str(&self, scope: &Scope, text: &str) -> Result<Value> {
        let envelope = Envelope::from_json_str(text)?;
        self.deserialize(scope, &envelope).await
    }

    /// Re-encrypts every secret of a stored envelope from the password of
    /// `from` to the password of `to`. Schema and date nodes are kept verbatim.
    pub async fn rekey(&self, envelope: &Envelope, from: &Scope, to: &Scope) -> Result<Envelope> {
        let codec = self.codec.as_ref();
        envelope
            .map_secrets(&|payload: String| reseal(codec, payload, from, to))
            .await
    }

    /// Decrypts every secret of a stored envelope, leaving the plaintext under
    /// the `@secret` tag. Schema and date nodes are kept verbatim.
    pub async fn reveal(&self, envelope: &Envelope, scope: &Scope) -> Result<Envelope> {
        let codec = self.codec.as_ref();
        envelope
            .map_secrets(&|payload: String| open_secret(codec, payload, scope))
            .await
    }
}

async fn open_secret(codec: &dyn SecretCodec, payload: String, scope: &Scope) -> Result<String> {
    let password = scope.password().ok_or_else(|| {
        Error::ConfigurationError("Cannot deserialize secret without password".to_string())
    })?;
    codec.decrypt_with_key(&payload, password).await
}

async fn reseal(codec: &dyn SecretCodec, payload: String, from: &Scope, to: &Scope) -> Result<String> {
    let plaintext = open_secret(codec, payload, from).await?;
    let password = to.password().ok_or_else(|| {
        Error::ConfigurationError("Cannot serialize secret without password".to_string())
    })?;
    codec.encrypt(&plaintext, password).await
}

impl Default for StateSerde {
    fn default() -> Self {
        Self::with_config(&CodecConfig::default())
    }
}
