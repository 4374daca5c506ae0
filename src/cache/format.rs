//! Cached public key record format.
//!
//! A record stores the PEM exactly as fetched, plus:
//! - when it was fetched (drives freshness)
//! - the registry's own expiry, if it sent one
//! - a SHA-256 fingerprint of the PEM, re-checked on every load

use crate::clock::Clock;
use crate::crypto::digest::{fingerprint_pem, verify_fingerprint};
use crate::protocol::registry::FetchedKey;
use crate::SkillgateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How far in the future `fetched_at` may be before the record is distrusted.
pub const MAX_FUTURE_SKEW_SECONDS: i64 = 60;

/// A cached public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyRecord {
    /// Key identifier this record answers for.
    pub key_id: String,

    /// PEM-encoded public key.
    pub pem_material: String,

    /// Algorithm the key verifies.
    pub algorithm: String,

    /// When the key was fetched from the registry.
    pub fetched_at: DateTime<Utc>,

    /// Registry-declared expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// `sha256:<hex>` of `pem_material`.
    pub fingerprint: String,
}

impl PublicKeyRecord {
    /// Build a record for a freshly fetched key, stamped with the clock's time.
    pub fn new(key_id: &str, fetched: FetchedKey, clock: &dyn Clock) -> Self {
        let fingerprint = fingerprint_pem(&fetched.pem);
        Self {
            key_id: key_id.to_string(),
            pem_material: fetched.pem,
            algorithm: fetched.algorithm,
            fetched_at: clock.now_utc(),
            expires_at: fetched.expires_at,
            fingerprint,
        }
    }

    /// Serialize the record to JSON.
    pub fn to_json(&self) -> Result<String, SkillgateError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SkillgateError::CacheIO(format!("Failed to serialize key record: {}", e)))
    }

    /// Deserialize a record from JSON.
    pub fn from_json(json: &str) -> Result<Self, SkillgateError> {
        serde_json::from_str(json)
            .map_err(|e| SkillgateError::CacheCorrupted(format!("Failed to deserialize key record: {}", e)))
    }

    /// Check the record is internally consistent and belongs to `key_id`.
    pub fn verify_integrity(&self, key_id: &str) -> Result<(), SkillgateError> {
        if self.key_id != key_id {
            return Err(SkillgateError::CacheCorrupted(format!(
                "record for {:?} stored under {:?}",
                self.key_id, key_id
            )));
        }
        verify_fingerprint(&self.pem_material, &self.fingerprint)
    }

    /// Whether the record can be used without refreshing.
    ///
    /// Fresh means all of:
    /// 1. fetched no more than `max_age` ago
    /// 2. the registry's `expires_at`, if any, has not passed
    /// 3. `fetched_at` is not in the future beyond clock skew tolerance
    pub fn is_fresh(&self, max_age: Duration, clock: &dyn Clock) -> bool {
        let now = clock.now_utc();
        let age = now.signed_duration_since(self.fetched_at);

        if age.num_seconds() < -MAX_FUTURE_SKEW_SECONDS {
            return false;
        }

        let max_age_secs = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        if age.num_seconds() > max_age_secs {
            return false;
        }

        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }

    /// Age of the record at the clock's current time.
    pub fn age(&self, clock: &dyn Clock) -> chrono::Duration {
        clock.now_utc().signed_duration_since(self.fetched_at)
    }
}
