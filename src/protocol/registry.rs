//! Key registry response model for `GET /public-keys/{key_id}`.

use crate::SkillgateError;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Algorithm assumed when the registry does not say.
pub const DEFAULT_KEY_ALGORITHM: &str = "RS256";

/// Raw registry response body.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryKeyResponse {
    /// PEM-encoded public key.
    pub public_key: String,

    /// When the registry stops vouching for this key.
    #[serde(default)]
    pub expires_at: Option<RegistryTimestamp>,

    /// Algorithm the key is meant for.
    #[serde(default)]
    pub algorithm: Option<String>,
}

/// Registries send either RFC 3339 strings or epoch seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RegistryTimestamp {
    /// Unix seconds.
    Epoch(i64),
    /// RFC 3339 text.
    Text(String),
}

impl RegistryTimestamp {
    /// Convert to UTC.
    pub fn to_utc(&self) -> Result<DateTime<Utc>, SkillgateError> {
        match self {
            RegistryTimestamp::Epoch(secs) => DateTime::from_timestamp(*secs, 0).ok_or_else(|| {
                SkillgateError::RegistryProtocol(format!("expires_at {secs} out of range"))
            }),
            RegistryTimestamp::Text(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    SkillgateError::RegistryProtocol(format!("invalid expires_at {s:?}: {e}"))
                }),
        }
    }
}

/// A key as delivered by a key source, before it is cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedKey {
    /// PEM-encoded public key.
    pub pem: String,
    /// Algorithm the key is meant for.
    pub algorithm: String,
    /// Registry-declared expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Parse and sanity-check a registry body.
pub fn parse_registry_response(body: &[u8]) -> Result<FetchedKey, SkillgateError> {
    let response: RegistryKeyResponse = serde_json::from_slice(body).map_err(|e| {
        SkillgateError::RegistryProtocol(format!("Failed to parse registry response: {e}"))
    })?;

    let pem = response.public_key.trim();
    if !pem.starts_with("-----BEGIN ") || !pem.contains("-----END ") {
        return Err(SkillgateError::RegistryProtocol(
            "public_key is not PEM encoded".to_string(),
        ));
    }

    let expires_at = response
        .expires_at
        .as_ref()
        .map(RegistryTimestamp::to_utc)
        .transpose()?;

    let algorithm = response
        .algorithm
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_KEY_ALGORITHM.to_string());

    Ok(FetchedKey {
        pem: format!("{pem}\n"),
        algorithm,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEM: &str = "-----BEGIN PUBLIC KEY-----\\nMIIB\\n-----END PUBLIC KEY-----";

    #[test]
    fn parses_rfc3339_expiry() {
        let body = format!(r#"{{"public_key":"{PEM}","expires_at":"2026-01-01T00:00:00Z"}}"#);
        let key = parse_registry_response(body.as_bytes()).unwrap();
        assert!(key.pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert_eq!(key.algorithm, DEFAULT_KEY_ALGORITHM);
        assert_eq!(key.expires_at.unwrap().to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn parses_epoch_expiry_and_algorithm() {
        let body =
            format!(r#"{{"public_key":"{PEM}","expires_at":1767225600,"algorithm":"RS512"}}"#);
        let key = parse_registry_response(body.as_bytes()).unwrap();
        assert_eq!(key.algorithm, "RS512");
        assert_eq!(key.expires_at.unwrap().timestamp(), 1_767_225_600);
    }

    #[test]
    fn expiry_is_optional() {
        let body = format!(r#"{{"public_key":"{PEM}"}}"#);
        assert!(parse_registry_response(body.as_bytes()).unwrap().expires_at.is_none());
    }

    #[test]
    fn rejects_malformed_bodies() {
        let bad_expiry = format!(r#"{{"public_key":"{PEM}","expires_at":"soon"}}"#);
        for body in [
            "not json",
            r#"{"expires_at":"2026-01-01T00:00:00Z"}"#,
            r#"{"public_key":"just some text"}"#,
            r#"{"public_key":42}"#,
            bad_expiry.as_str(),
        ] {
            let result = parse_registry_response(body.as_bytes());
            assert!(
                matches!(result, Err(SkillgateError::RegistryProtocol(_))),
                "{body} should be rejected"
            );
        }
    }
}
