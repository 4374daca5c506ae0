//! Validation results and the exit-code contract.
//!
//! External tooling branches on both the status string and the process exit
//! code, so each is produced by exactly one `match` below.

use crate::fetcher::KeyOrigin;
use crate::policy::expiry::{ExpiryStatus, LicenseClaims};
use crate::SkillgateError;
use chrono::Duration;

/// Result of one validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Signature verified and the license has not expired.
    Valid {
        /// Time left until `exp`.
        remaining: Duration,
    },
    /// Signature verified, license expired, still inside the tier's grace window.
    Grace {
        /// Time left until the grace window closes.
        remaining: Duration,
    },
    /// Signature verified, grace window over.
    Expired {
        /// Time since `exp`.
        since: Duration,
    },
    /// No artifact, or no token in it.
    MissingArtifact,
    /// Signature did not verify.
    InvalidSignature,
    /// Artifact or token is structurally unusable.
    MalformedToken,
    /// Infrastructure failure unrelated to the license itself.
    TransientError,
}

impl ValidationOutcome {
    /// Stable, machine-greppable status string.
    pub fn status(&self) -> &'static str {
        match self {
            ValidationOutcome::Valid { .. } => "VALID",
            ValidationOutcome::Grace { .. } => "GRACE",
            ValidationOutcome::Expired { .. } => "EXPIRED",
            ValidationOutcome::MissingArtifact => "MISSING_ARTIFACT",
            ValidationOutcome::InvalidSignature => "INVALID_SIGNATURE",
            ValidationOutcome::MalformedToken => "MALFORMED_TOKEN",
            ValidationOutcome::TransientError => "TRANSIENT_ERROR",
        }
    }

    /// Process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidationOutcome::Valid { .. } => 0,
            ValidationOutcome::Grace { .. } => 1,
            ValidationOutcome::Expired { .. } => 2,
            ValidationOutcome::MissingArtifact => 3,
            ValidationOutcome::InvalidSignature => 4,
            ValidationOutcome::MalformedToken => 4,
            ValidationOutcome::TransientError => 5,
        }
    }

    /// Whether the gated capability may be used (Valid or Grace).
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            ValidationOutcome::Valid { .. } | ValidationOutcome::Grace { .. }
        )
    }

    /// Fold an error into the outcome it is reported as.
    pub fn from_error(error: &SkillgateError) -> Self {
        match error {
            SkillgateError::ArtifactMissing(_) => ValidationOutcome::MissingArtifact,
            SkillgateError::ArtifactInvalid(_)
            | SkillgateError::MalformedToken(_)
            | SkillgateError::InvalidKeyId(_)
            | SkillgateError::MissingExpiry => ValidationOutcome::MalformedToken,
            SkillgateError::SignatureInvalid | SkillgateError::UnsupportedAlgorithm(_) => {
                ValidationOutcome::InvalidSignature
            }
            SkillgateError::ConfigError(_)
            | SkillgateError::KeyUnavailable(_)
            | SkillgateError::RegistryTransport(_)
            | SkillgateError::RegistryProtocol(_)
            | SkillgateError::CacheIO(_)
            | SkillgateError::CacheCorrupted(_) => ValidationOutcome::TransientError,
        }
    }
}

impl From<ExpiryStatus> for ValidationOutcome {
    fn from(status: ExpiryStatus) -> Self {
        match status {
            ExpiryStatus::Valid { remaining } => ValidationOutcome::Valid { remaining },
            ExpiryStatus::Grace { remaining } => ValidationOutcome::Grace { remaining },
            ExpiryStatus::Expired { since } => ValidationOutcome::Expired { since },
        }
    }
}

impl std::fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.status())
    }
}

/// Result of `verify-signature`, which stops before any expiry check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureVerdict {
    /// Signature verified.
    Verified,
    /// Signature did not verify.
    InvalidSignature,
    /// Token could not be parsed.
    MalformedToken,
    /// No key could be resolved, or other infrastructure failure.
    KeyUnavailable,
}

impl SignatureVerdict {
    /// Stable status string.
    pub fn status(&self) -> &'static str {
        match self {
            SignatureVerdict::Verified => "SIGNATURE_VALID",
            SignatureVerdict::InvalidSignature => "INVALID_SIGNATURE",
            SignatureVerdict::MalformedToken => "MALFORMED_TOKEN",
            SignatureVerdict::KeyUnavailable => "KEY_UNAVAILABLE",
        }
    }

    /// Process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            SignatureVerdict::Verified => 0,
            SignatureVerdict::InvalidSignature => 4,
            SignatureVerdict::MalformedToken => 4,
            SignatureVerdict::KeyUnavailable => 5,
        }
    }

    /// Fold an error into a verdict.
    pub fn from_error(error: &SkillgateError) -> Self {
        match ValidationOutcome::from_error(error) {
            ValidationOutcome::InvalidSignature => SignatureVerdict::InvalidSignature,
            ValidationOutcome::MalformedToken | ValidationOutcome::MissingArtifact => {
                SignatureVerdict::MalformedToken
            }
            _ => SignatureVerdict::KeyUnavailable,
        }
    }
}

/// Everything one validation run found out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// The single outcome of the run.
    pub outcome: ValidationOutcome,
    /// Claims, present only when the signature verified.
    pub claims: Option<LicenseClaims>,
    /// Where the verifying key came from, once one was resolved.
    pub key_origin: Option<KeyOrigin>,
    /// Human-readable reason for a failure.
    pub detail: Option<String>,
}

impl ValidationReport {
    /// Report for a run that ended in an error.
    pub fn failed(error: &SkillgateError, key_origin: Option<KeyOrigin>) -> Self {
        Self {
            outcome: ValidationOutcome::from_error(error),
            claims: None,
            key_origin,
            detail: Some(error.to_string()),
        }
    }

    /// Process exit code.
    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }
}

/// Render a duration as `1d 2h 3m 4s`, omitting leading zero units.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let (days, hours, minutes, seconds) = (
        total / 86_400,
        total % 86_400 / 3600,
        total % 3600 / 60,
        total % 60,
    );
    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
