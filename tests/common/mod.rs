//! Shared test helpers for validation scenarios.

#![allow(dead_code)]

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::Sha256;
use skillgate::{Clock, FetchedKey, KeySource, SkillgateError};
use std::sync::atomic::{AtomicUsize, Ordering};

pub const PRIMARY_PRIVATE_PEM: &str = include_str!("../fixtures/primary.key.pem");
pub const PRIMARY_PUBLIC_PEM: &str = include_str!("../fixtures/primary.pub.pem");
pub const ROTATED_PUBLIC_PEM: &str = include_str!("../fixtures/rotated.pub.pem");

/// Fixed "now" for every scenario: 2025-06-15T14:13:20Z.
pub const NOW: i64 = 1_750_000_000;

pub const HEADER: &str = r#"{"alg":"RS256","kid":"primary","typ":"JWT"}"#;

/// Clock frozen at a unix timestamp.
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap()
    }
}

pub fn b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Creates an RS256 token with the primary fixture key.
pub fn sign_token(header_json: &str, payload_json: &str) -> String {
    let key = RsaPrivateKey::from_pkcs1_pem(PRIMARY_PRIVATE_PEM).unwrap();
    let signing_key = SigningKey::<Sha256>::new(key);
    let signing_input = format!(
        "{}.{}",
        b64(header_json.as_bytes()),
        b64(payload_json.as_bytes())
    );
    let signature = signing_key.sign(signing_input.as_bytes());
    format!("{signing_input}.{}", b64(&signature.to_bytes()))
}

/// Creates a license token for the `deploy` skill.
pub fn license_token(tier: &str, exp: i64) -> String {
    let payload = format!(r#"{{"skill":"deploy","tier":"{tier}","exp":{exp},"iat":{NOW}}}"#);
    sign_token(HEADER, &payload)
}

/// Registry stand-in serving one key, or unreachable.
pub struct StubRegistry {
    pem: Option<&'static str>,
    calls: AtomicUsize,
}

impl StubRegistry {
    pub fn serving(pem: &'static str) -> Self {
        Self {
            pem: Some(pem),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            pem: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KeySource for StubRegistry {
    fn fetch_key(&self, _key_id: &str) -> Result<FetchedKey, SkillgateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.pem {
            Some(pem) => Ok(FetchedKey {
                pem: pem.to_string(),
                algorithm: "RS256".to_string(),
                expires_at: None,
            }),
            None => Err(SkillgateError::RegistryTransport(
                "connection timed out".to_string(),
            )),
        }
    }
}
