// Encode module: value tree -> envelope tree
//
// Each node is matched in a fixed precedence order:
//   Array -> Secret -> Schema -> Date -> Scope -> Object -> scalar
// Children of arrays and objects are serialized as concurrent futures and
// joined in index order; the first failure aborts the whole walk.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use futures::future::{try_join_all, BoxFuture, FutureExt};

use crate::codec::envelope::Envelope;
use crate::codec::types::{Secret, Value};
use crate::encrypt::SecretCodec;
use crate::internal::error::{Error, Result};
use crate::scope::Scope;

/// Options controlling serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeOptions {
    /// When false, secrets are stored as their raw plaintext.
    pub encrypt: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self { encrypt: true }
    }
}

impl SerializeOptions {
    /// Options that store secrets unencrypted.
    pub fn plaintext() -> Self {
        Self { encrypt: false }
    }
}

/// Serializes a value tree into its envelope form.
///
/// Returns `None` when the value itself carries no persistable data
/// (a scope). Fails with a configuration error when a secret is found and
/// the scope has no password.
pub async fn serialize(
    codec: &dyn SecretCodec,
    scope: &Scope,
    value: &Value,
    options: SerializeOptions,
) -> Result<Option<Envelope>> {
    log::debug!(
        "Serializing {:?} in scope '{}' (encrypt: {})",
        value.kind(),
        scope.name(),
        options.encrypt
    );
    serialize_value(codec, scope, value, options).await
}

fn serialize_value<'a>(
    codec: &'a dyn SecretCodec,
    scope: &'a Scope,
    value: &'a Value,
    options: SerializeOptions,
) -> BoxFuture<'a, Result<Option<Envelope>>> {
    serialize_node(codec, scope, value, options).boxed()
}

async fn serialize_node(
    codec: &dyn SecretCodec,
    scope: &Scope,
    value: &Value,
    options: SerializeOptions,
) -> Result<Option<Envelope>> {
    let envelope = match value {
        Value::Array(items) => {
            let envelopes = try_join_all(
                items
                    .iter()
                    .map(|item| serialize_value(codec, scope, item, options)),
            )
            .await?;
            // A scope inside an array keeps its slot as null
            Envelope::Array(
                envelopes
                    .into_iter()
                    .map(|e| e.unwrap_or(Envelope::Null))
                    .collect(),
            )
        }
        Value::Secret(secret) => serialize_secret(codec, scope, secret, options).await?,
        Value::Schema(schema) => Envelope::Schema(schema.to_json_schema()?),
        Value::Date(date) => Envelope::Date(format_date(date)),
        Value::Scope(_) => return Ok(None),
        Value::Object(fields) => {
            let values = try_join_all(
                fields
                    .iter()
                    .map(|field| serialize_value(codec, scope, &field.value, options)),
            )
            .await?;
            // Repeated keys collapse onto the first slot, last value wins
            let mut entries: Vec<(&str, Option<Envelope>)> = Vec::with_capacity(fields.len());
            for (field, value) in fields.iter().zip(values) {
                match entries.iter_mut().find(|(key, _)| *key == field.key) {
                    Some(entry) => entry.1 = value,
                    None => entries.push((field.key.as_str(), value)),
                }
            }
            Envelope::Object(
                entries
                    .into_iter()
                    .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
                    .collect(),
            )
        }
        Value::Null => Envelope::Null,
        Value::Bool(b) => Envelope::Bool(*b),
        Value::Number(n) => Envelope::Number(n.clone()),
        Value::String(s) => Envelope::String(s.clone()),
    };
    Ok(Some(envelope))
}

async fn serialize_secret(
    codec: &dyn SecretCodec,
    scope: &Scope,
    secret: &Secret,
    options: SerializeOptions,
) -> Result<Envelope> {
    let password = scope.password().ok_or_else(|| {
        Error::ConfigurationError("Cannot serialize secret without password".to_string())
    })?;

    let payload = if options.encrypt {
        log::trace!("Encrypting secret payload");
        codec.encrypt(&secret.unencrypted, password).await?
    } else {
        log::trace!("Storing secret payload unencrypted");
        secret.unencrypted.clone()
    };
    Ok(Envelope::Secret(payload))
}

/// Formats a date as an ISO-8601 UTC timestamp with millisecond precision,
/// e.g. `2024-01-02T03:04:05.678Z`.
///
/// Years outside `0..=9999` use the expanded six-digit form with an explicit
/// sign, e.g. `+010000-01-01T00:00:00.000Z`.
pub fn format_date(date: &DateTime<Utc>) -> String {
    let year = date.year();
    if (0..=9999).contains(&year) {
        return date.to_rfc3339_opts(SecondsFormat::Millis, true);
    }
    let sign = if year < 0 { '-' } else { '+' };
    format!(
        "{}{:06}{}",
        sign,
        year.unsigned_abs(),
        date.format("-%m-%dT%H:%M:%S%.3fZ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::types::Field;
    use crate::encrypt::NoEncryptionCodec;
    use crate::schema::SchemaType;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Arc;

    fn scope() -> Scope {
        Scope::new("test").with_password("pw")
    }

    #[tokio::test]
    async fn test_serialize_scalars_pass_through() {
        let value = Value::Array(vec![
            Value::Null,
            Value::from(true),
            Value::from(42),
            Value::from("text"),
        ]);
        let envelope = serialize(&NoEncryptionCodec, &scope(), &value, SerializeOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope.to_json(), json!([null, true, 42, "text"]));
    }

    #[tokio::test]
    async fn test_serialize_date() {
        let date = Utc.timestamp_millis_opt(1_704_164_645_678).unwrap();
        let envelope = serialize(&NoEncryptionCodec, &scope(), &Value::from(date), SerializeOptions::default())
            .await
            .unwrap();
        assert_eq!(envelope, Some(Envelope::Date("2024-01-02T03:04:05.678Z".to_string())));
    }

    #[test]
    fn test_format_date_expanded_years() {
        let far = Utc.timestamp_millis_opt(253_402_300_800_000).unwrap();
        assert_eq!(format_date(&far), "+010000-01-01T00:00:00.000Z");

        let last_four_digit = Utc.timestamp_millis_opt(253_402_300_799_999).unwrap();
        assert_eq!(format_date(&last_four_digit), "9999-12-31T23:59:59.999Z");

        let before_year_zero = Utc.timestamp_millis_opt(-62_198_755_199_877).unwrap();
        assert_eq!(format_date(&before_year_zero), "-000001-01-01T00:00:00.123Z");
    }

    #[tokio::test]
    async fn test_serialize_schema() {
        let value = Value::schema(SchemaType::Array(Box::new(SchemaType::String)));
        let envelope = serialize(&NoEncryptionCodec, &scope(), &value, SerializeOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            envelope.to_json(),
            json!({ "@schema": { "type": "array", "items": { "type": "string" } } })
        );
    }

    #[tokio::test]
    async fn test_serialize_scope_is_omitted() {
        let inner = Arc::new(Scope::new("inner"));
        let value = Value::object()
            .with("name", "bucket")
            .with("scope", inner.clone())
            .with("list", Value::Array(vec![Value::from(1), Value::Scope(inner.clone())]));

        let envelope = serialize(&NoEncryptionCodec, &scope(), &value, SerializeOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope.to_json(), json!({ "name": "bucket", "list": [1, null] }));

        let top = serialize(&NoEncryptionCodec, &scope(), &Value::Scope(inner), SerializeOptions::default())
            .await
            .unwrap();
        assert_eq!(top, None);
    }

    #[tokio::test]
    async fn test_serialize_repeated_keys_last_value_wins() {
        let inner = Arc::new(Scope::new("inner"));
        let value = Value::Object(vec![
            Field::new("a", 1),
            Field::new("b", 2),
            Field::new("a", 3),
            Field::new("c", 4),
            Field::new("c", Value::Scope(inner)),
        ]);

        let envelope = serialize(&NoEncryptionCodec, &scope(), &value, SerializeOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope.to_json_string().unwrap(), r#"{"a":3,"b":2}"#);
    }

    #[tokio::test]
    async fn test_serialize_secret_requires_password() {
        let value = Value::from(Secret::new("x"));
        let err = serialize(&NoEncryptionCodec, &Scope::new("bare"), &value, SerializeOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "Configuration Error: Cannot serialize secret without password"
        );
    }

    #[tokio::test]
    async fn test_serialize_secret_plaintext_escape_hatch() {
        let value = Value::from(Secret::new("x"));
        let envelope = serialize(&NoEncryptionCodec, &scope(), &value, SerializeOptions::plaintext())
            .await
            .unwrap();
        assert_eq!(envelope, Some(Envelope::Secret("x".to_string())));
    }
}
