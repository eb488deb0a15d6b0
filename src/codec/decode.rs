// Decode module: envelope tree -> value tree
//
// Tags were already recognised when the envelope was parsed, so decoding
// only reconstructs typed values and recurses into plain containers.

use chrono::{DateTime, Datelike, Utc};
use futures::future::{try_join_all, BoxFuture, FutureExt};

use crate::codec::envelope::Envelope;
use crate::codec::types::{Field, Secret, Value};
use crate::encrypt::SecretCodec;
use crate::internal::error::{Error, Result};
use crate::scope::Scope;

/// Deserializes an envelope tree back into a value tree.
///
/// Schema envelopes yield their stored descriptor as a plain value.
pub async fn deserialize(codec: &dyn SecretCodec, scope: &Scope, envelope: &Envelope) -> Result<Value> {
    log::debug!("Deserializing envelope in scope '{}'", scope.name());
    deserialize_value(codec, scope, envelope).await
}

fn deserialize_value<'a>(
    codec: &'a dyn SecretCodec,
    scope: &'a Scope,
    envelope: &'a Envelope,
) -> BoxFuture<'a, Result<Value>> {
    deserialize_node(codec, scope, envelope).boxed()
}

async fn deserialize_node(codec: &dyn SecretCodec, scope: &Scope, envelope: &Envelope) -> Result<Value> {
    let value = match envelope {
        Envelope::Array(items) => Value::Array(
            try_join_all(items.iter().map(|item| deserialize_value(codec, scope, item))).await?,
        ),
        Envelope::Secret(ciphertext) => {
            let password = scope.password().ok_or_else(|| {
                Error::ConfigurationError(
                    "Cannot deserialize secret without password".to_string(),
                )
            })?;
            log::trace!("Decrypting secret payload");
            Value::Secret(Secret::new(codec.decrypt_with_key(ciphertext, password).await?))
        }
        Envelope::Schema(descriptor) => Value::from(descriptor.clone()),
        Envelope::Date(timestamp) => Value::Date(parse_date(timestamp)?),
        Envelope::Object(fields) => {
            let values = try_join_all(
                fields
                    .iter()
                    .map(|(_, value)| deserialize_value(codec, scope, value)),
            )
            .await?;
            Value::Object(
                fields
                    .iter()
                    .zip(values)
                    .map(|((key, _), value)| Field {
                        key: key.clone(),
                        value,
                    })
                    .collect(),
            )
        }
        Envelope::Null => Value::Null,
        Envelope::Bool(b) => Value::Bool(*b),
        Envelope::Number(n) => Value::Number(n.clone()),
        Envelope::String(s) => Value::String(s.clone()),
    };
    Ok(value)
}

/// Parses an ISO-8601 / RFC 3339 timestamp into a UTC date.
///
/// Accepts the expanded `±YYYYYY` year form written for years outside
/// `0..=9999`.
pub fn parse_date(timestamp: &str) -> Result<DateTime<Utc>> {
    let parsed = match DateTime::parse_from_rfc3339(timestamp) {
        Ok(date) => Ok(date),
        Err(e) => parse_expanded_year(timestamp).ok_or(e),
    };
    parsed
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| Error::CodecError(format!("Invalid timestamp '{}': {}", timestamp, e)))
}

fn parse_expanded_year(timestamp: &str) -> Option<DateTime<chrono::FixedOffset>> {
    let sign = match timestamp.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits = timestamp.get(1..7)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = digits.parse().ok()?;

    // Parse the rest against a leap year so Feb 29 survives, then move to the real year
    let anchored = DateTime::parse_from_rfc3339(&format!("2000{}", timestamp.get(7..)?)).ok()?;
    anchored.with_year(sign * year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encrypt::NoEncryptionCodec;
    use chrono::TimeZone;
    use serde_json::json;

    fn scope() -> Scope {
        Scope::new("test").with_password("pw")
    }

    #[tokio::test]
    async fn test_deserialize_plain_tree() {
        let envelope = Envelope::from_json(json!({ "a": [1, "two", null], "b": { "c": false } })).unwrap();
        let value = deserialize(&NoEncryptionCodec, &scope(), &envelope).await.unwrap();
        assert_eq!(
            value,
            Value::from(json!({ "a": [1, "two", null], "b": { "c": false } }))
        );
    }

    #[tokio::test]
    async fn test_deserialize_date() {
        let envelope = Envelope::Date("2024-01-02T03:04:05.678Z".to_string());
        let value = deserialize(&NoEncryptionCodec, &scope(), &envelope).await.unwrap();
        assert_eq!(
            value.as_date(),
            Some(&Utc.timestamp_millis_opt(1_704_164_645_678).unwrap())
        );
    }

    #[tokio::test]
    async fn test_deserialize_invalid_date() {
        let envelope = Envelope::Date("yesterday".to_string());
        let err = deserialize(&NoEncryptionCodec, &scope(), &envelope).await.unwrap_err();
        assert!(matches!(err, Error::CodecError(_)));
    }

    #[tokio::test]
    async fn test_deserialize_schema_yields_descriptor() {
        let envelope = Envelope::Schema(json!({ "type": "string" }));
        let value = deserialize(&NoEncryptionCodec, &scope(), &envelope).await.unwrap();
        assert_eq!(value, Value::from(json!({ "type": "string" })));
    }

    #[tokio::test]
    async fn test_deserialize_secret_requires_password() {
        let envelope = Envelope::Secret("ct".to_string());
        let err = deserialize(&NoEncryptionCodec, &Scope::new("bare"), &envelope)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "Configuration Error: Cannot deserialize secret without password"
        );
    }

    #[test]
    fn test_parse_date_expanded_years() {
        assert_eq!(
            parse_date("+010000-01-01T00:00:00.000Z").unwrap(),
            Utc.timestamp_millis_opt(253_402_300_800_000).unwrap()
        );
        assert_eq!(
            parse_date("-000001-01-01T00:00:00.123Z").unwrap(),
            Utc.timestamp_millis_opt(-62_198_755_199_877).unwrap()
        );
        // 10100 is not a leap year, 10000 is
        assert!(parse_date("+010100-02-29T00:00:00.000Z").is_err());
        assert!(parse_date("+010000-02-29T00:00:00.000Z").is_ok());
        assert!(parse_date("+10000-01-01T00:00:00.000Z").is_err());
    }

    #[test]
    fn test_parse_date_offsets_normalise_to_utc() {
        let date = parse_date("2024-01-02T05:04:05.678+02:00").unwrap();
        assert_eq!(date, Utc.timestamp_millis_opt(1_704_164_645_678).unwrap());
    }
}
