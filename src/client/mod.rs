//! Public key sources.

pub mod http;

use crate::protocol::registry::FetchedKey;
use crate::SkillgateError;

pub use http::RegistryClient;

/// Something that can produce the public key for a key identifier.
///
/// The registry client is the production implementation. Failures must use
/// [`SkillgateError::RegistryTransport`] when the source could not be
/// reached and [`SkillgateError::RegistryProtocol`] when it answered with
/// something unusable; only the former allows a stale cached key.
pub trait KeySource: Send + Sync {
    /// Fetch the key for `key_id`.
    fn fetch_key(&self, key_id: &str) -> Result<FetchedKey, SkillgateError>;
}
