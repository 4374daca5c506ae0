//! Shared helpers for unit tests: fixed RSA keys, token minting, a scripted key source.

#![allow(dead_code)]

use crate::client::KeySource;
use crate::protocol::registry::FetchedKey;
use crate::SkillgateError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const PRIMARY_PRIVATE_PEM: &str = include_str!("../tests/fixtures/primary.key.pem");
pub const PRIMARY_PUBLIC_PEM: &str = include_str!("../tests/fixtures/primary.pub.pem");
pub const PRIMARY_PUBLIC_PKCS1_PEM: &str = include_str!("../tests/fixtures/primary.pub.pkcs1.pem");
pub const ROTATED_PRIVATE_PEM: &str = include_str!("../tests/fixtures/rotated.key.pem");
pub const ROTATED_PUBLIC_PEM: &str = include_str!("../tests/fixtures/rotated.pub.pem");
pub const WEAK_PRIVATE_PEM: &str = include_str!("../tests/fixtures/weak.key.pem");
pub const WEAK_PUBLIC_PEM: &str = include_str!("../tests/fixtures/weak.pub.pem");

pub fn b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Mint an RS256 token over the given header/payload JSON with a PKCS#1 private key.
pub fn sign_with(private_pem: &str, header_json: &str, payload_json: &str) -> String {
    let private_key = RsaPrivateKey::from_pkcs1_pem(private_pem).expect("fixture key parses");
    let signing_key = SigningKey::<Sha256>::new(private_key);
    let signing_input = format!(
        "{}.{}",
        b64(header_json.as_bytes()),
        b64(payload_json.as_bytes())
    );
    let signature = signing_key.sign(signing_input.as_bytes());
    format!("{}.{}", signing_input, b64(&signature.to_bytes()))
}

/// Mint an RS256 token with the primary fixture key.
pub fn sign_rs256(header_json: &str, payload_json: &str) -> String {
    sign_with(PRIMARY_PRIVATE_PEM, header_json, payload_json)
}

/// Mint a token through `jsonwebtoken` with the primary fixture key.
pub fn sign_jwt(alg: Algorithm, kid: &str, payload_json: &str) -> String {
    let mut header = Header::new(alg);
    header.kid = Some(kid.to_string());
    let claims: serde_json::Value = serde_json::from_str(payload_json).expect("payload is JSON");
    let key = EncodingKey::from_rsa_pem(PRIMARY_PRIVATE_PEM.as_bytes()).expect("fixture key parses");
    jsonwebtoken::encode(&header, &claims, &key).expect("token encodes")
}

/// Key source serving fixed PEMs, or failing like an unreachable registry.
pub struct MockKeySource {
    keys: HashMap<String, String>,
    unreachable: bool,
    calls: AtomicUsize,
}

impl MockKeySource {
    pub fn serving(key_id: &str, pem: &str) -> Self {
        let mut keys = HashMap::new();
        keys.insert(key_id.to_string(), pem.to_string());
        Self {
            keys,
            unreachable: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            keys: HashMap::new(),
            unreachable: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KeySource for MockKeySource {
    fn fetch_key(&self, key_id: &str) -> Result<FetchedKey, SkillgateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(SkillgateError::RegistryTransport(
                "connection refused".to_string(),
            ));
        }
        match self.keys.get(key_id) {
            Some(pem) => Ok(FetchedKey {
                pem: pem.clone(),
                algorithm: "RS256".to_string(),
                expires_at: None,
            }),
            None => Err(SkillgateError::RegistryProtocol(format!(
                "registry returned 404 for {key_id}"
            ))),
        }
    }
}
