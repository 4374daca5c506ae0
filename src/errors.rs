//! Skillgate error types.

use thiserror::Error;

/// Errors that can occur while validating a license artifact.
///
/// These never leave the crate as a process status on their own; the
/// validator folds each one into exactly one
/// [`ValidationOutcome`](crate::ValidationOutcome).
#[derive(Debug, Error)]
pub enum SkillgateError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// No license artifact (or no token inside it).
    #[error("License artifact missing: {0}")]
    ArtifactMissing(String),

    /// Artifact exists but is not a usable JSON document.
    #[error("License artifact invalid: {0}")]
    ArtifactInvalid(String),

    /// Token is structurally invalid (segment count, alphabet, encoding, JSON).
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Key identifier contains characters outside the allow-list.
    #[error("Invalid key id: {0:?}")]
    InvalidKeyId(String),

    /// Token declares an algorithm that is forbidden or not implemented.
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Signature verification failed.
    #[error("Token signature verification failed")]
    SignatureInvalid,

    /// Payload has no usable `exp` claim.
    #[error("Token payload has no valid exp claim")]
    MissingExpiry,

    /// No key could be resolved (no cache, no network, or fetch rejected).
    #[error("Public key unavailable: {0}")]
    KeyUnavailable(String),

    /// Registry could not be reached (connect failure, timeout, 5xx).
    #[error("Registry transport error: {0}")]
    RegistryTransport(String),

    /// Registry answered, but with a rejection or an unusable body.
    #[error("Registry protocol error: {0}")]
    RegistryProtocol(String),

    /// Key cache I/O error.
    #[error("Cache I/O error: {0}")]
    CacheIO(String),

    /// Cached key record failed its integrity check.
    #[error("Cached key record corrupted: {0}")]
    CacheCorrupted(String),
}

impl SkillgateError {
    /// Whether this error means the registry was unreachable, which is the
    /// only condition that permits falling back to a stale cached key.
    pub fn is_network_failure(&self) -> bool {
        matches!(self, SkillgateError::RegistryTransport(_))
    }
}
