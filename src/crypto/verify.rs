//! Token signature verification.
//!
//! Fail-closed: a forbidden or unimplemented algorithm, an unparseable key,
//! a malformed signature and a mismatched signature are all
//! `SignatureInvalid`. Nothing here ever answers "unsigned is fine".

use crate::cache::format::PublicKeyRecord;
use crate::crypto::backend::{JsonWebToken, RustCryptoRsa, SignatureBackend, SignedInput};
use crate::protocol::token::Token;
use crate::SkillgateError;

/// Algorithms that are never accepted: no signature, or a shared secret.
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Algorithms at least one backend implements.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["RS256", "RS384", "RS512"];

/// Check a header algorithm against the allow-list.
pub fn validate_algorithm(alg: &str) -> Result<(), SkillgateError> {
    if FORBIDDEN_ALGORITHMS
        .iter()
        .any(|forbidden| forbidden.eq_ignore_ascii_case(alg))
    {
        return Err(SkillgateError::UnsupportedAlgorithm(format!(
            "{alg} is not allowed"
        )));
    }
    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(SkillgateError::UnsupportedAlgorithm(format!(
            "{alg} is not in the accepted list"
        )));
    }
    Ok(())
}

/// Verifies token signatures using an ordered, closed set of backends.
pub struct SignatureVerifier {
    backends: Vec<Box<dyn SignatureBackend>>,
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self {
            backends: vec![Box::new(RustCryptoRsa), Box::new(JsonWebToken)],
        }
    }
}

impl SignatureVerifier {
    /// Verifier with an explicit backend order.
    pub fn with_backends(backends: Vec<Box<dyn SignatureBackend>>) -> Self {
        Self { backends }
    }

    /// Backend names in the order they are tried.
    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Verify `token` against a PEM public key, reporting why it failed.
    ///
    /// # Errors
    /// * `UnsupportedAlgorithm` - forbidden algorithm, or no backend implements it
    /// * `SignatureInvalid` - anything else that is not a verified signature
    pub fn check(&self, token: &Token, pem: &str) -> Result<(), SkillgateError> {
        let alg = token.algorithm();
        validate_algorithm(alg)?;

        let backend = self
            .backends
            .iter()
            .find(|b| b.supports(alg))
            .ok_or_else(|| {
                SkillgateError::UnsupportedAlgorithm(format!("no backend implements {alg}"))
            })?;

        let input = SignedInput {
            algorithm: alg,
            message: token.signing_input(),
            signature: token.signature(),
            encoded_signature: token.signature_segment(),
        };

        backend.verify(&input, pem).map_err(|e| {
            tracing::warn!(
                backend = backend.name(),
                key_id = token.key_id(),
                "token signature rejected"
            );
            e
        })
    }

    /// Verify against a cached key record.
    ///
    /// The record's algorithm pins what the key may verify, so a token
    /// cannot pick a different algorithm for the same key.
    pub fn check_record(&self, token: &Token, record: &PublicKeyRecord) -> Result<(), SkillgateError> {
        if record.algorithm != token.algorithm() {
            tracing::warn!(
                key_id = %record.key_id,
                key_alg = %record.algorithm,
                token_alg = token.algorithm(),
                "token algorithm does not match key algorithm"
            );
            return Err(SkillgateError::UnsupportedAlgorithm(format!(
                "key {} is for {}, token declares {}",
                record.key_id,
                record.algorithm,
                token.algorithm()
            )));
        }
        self.check(token, &record.pem_material)
    }

    /// Boolean form of [`SignatureVerifier::check`].
    pub fn verify(&self, token: &Token, pem: &str) -> bool {
        self.check(token, pem).is_ok()
    }
}

/// Verify `token` against `pem` with the default backend order.
pub fn verify(token: &Token, pem: &str) -> bool {
    SignatureVerifier::default().verify(token, pem)
}
