//! SHA-256 fingerprints of public key material.

use crate::SkillgateError;
use sha2::{Digest, Sha256};

/// Prefix on stored fingerprints.
const FINGERPRINT_PREFIX: &str = "sha256:";

/// Compute the SHA-256 of `bytes`, hex encoded.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Fingerprint of a PEM document: `sha256:<hex>`.
pub fn fingerprint_pem(pem: &str) -> String {
    format!("{}{}", FINGERPRINT_PREFIX, sha256_hex(pem.as_bytes()))
}

/// Compare a PEM document against a stored fingerprint.
///
/// # Returns
/// * `Ok(())` - fingerprint matches
/// * `Err(CacheCorrupted)` - fingerprint is malformed or does not match
pub fn verify_fingerprint(pem: &str, expected: &str) -> Result<(), SkillgateError> {
    let Some(expected_hex) = expected.strip_prefix(FINGERPRINT_PREFIX) else {
        return Err(SkillgateError::CacheCorrupted(format!(
            "unrecognized fingerprint format {expected:?}"
        )));
    };

    if sha256_hex(pem.as_bytes()) != expected_hex.to_ascii_lowercase() {
        return Err(SkillgateError::CacheCorrupted(
            "key material does not match its fingerprint".to_string(),
        ));
    }

    Ok(())
}
