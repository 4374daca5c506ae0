//! # Skillgate
//!
//! **Offline-tolerant license validation for gated skills.**
//!
//! A license is a JSON artifact holding one compact RS256 token. Skillgate
//! verifies the token against a rotating set of registry-published public
//! keys and, only once the signature holds, decides whether the license is
//! valid, in its grace window, or expired.
//!
//! ## Features
//!
//! - **Byte-exact RS256 verification** against the original token segments
//! - **Closed backend set**: RustCrypto `rsa` first, `jsonwebtoken` second
//! - **Algorithm allow-list**: `none` and `HS*` are always refused
//! - **Key cache** with atomic replace, safe for concurrent processes
//! - **Stale-key fallback** when the registry is unreachable, with a warning
//! - **Tier-dependent grace windows**
//!
//! ## Quickstart
//!
//! ```no_run
//! use skillgate::{SkillgateConfig, Validator};
//! use std::path::Path;
//!
//! fn main() -> Result<(), skillgate::SkillgateError> {
//!     let validator = Validator::new(SkillgateConfig::from_env()?)?;
//!     let report = validator.validate(Path::new("license.json"));
//!
//!     println!("{}", report.outcome.status());
//!     std::process::exit(report.exit_code());
//! }
//! ```
//!
//! ## Exit codes
//!
//! | Outcome | Code |
//! |---|---|
//! | `VALID` | 0 |
//! | `GRACE` | 1 |
//! | `EXPIRED` | 2 |
//! | `MISSING_ARTIFACT` | 3 |
//! | `INVALID_SIGNATURE`, `MALFORMED_TOKEN` | 4 |
//! | `TRANSIENT_ERROR` | 5 |
//!
//! ## Threat Model
//!
//! Skillgate protects against:
//! - **Forged or edited tokens**: signature checked before any claim is read
//! - **Algorithm confusion**: the cached key pins the algorithm
//! - **Cache path injection**: key ids are allow-listed before touching disk
//! - **Torn or edited cache files**: records carry a PEM fingerprint
//!
//! Skillgate does **not** prevent binary patching. Client-side licensing can
//! always be bypassed by someone who controls the binary.

#![warn(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Crypto layer
pub mod crypto;

// Protocol layer
pub mod protocol;

// Key sources
pub mod client;

// Cache layer
pub mod cache;

// Policy layer
pub mod policy;

// Key resolution
pub mod fetcher;

// Results
pub mod outcome;

// Validator (main public API)
pub mod validator;

#[cfg(test)]
mod test_support;

// Re-exports for public API
pub use cache::{KeyCache, PublicKeyRecord};
pub use client::{KeySource, RegistryClient};
pub use clock::{Clock, SystemClock};
pub use config::SkillgateConfig;
pub use errors::SkillgateError;
pub use fetcher::{KeyFetcher, KeyOrigin, ResolveOptions, ResolvedKey};
pub use outcome::{SignatureVerdict, ValidationOutcome, ValidationReport};
pub use policy::expiry::{ExpiryStatus, GraceTable, LicenseClaims, Tier};
pub use protocol::registry::FetchedKey;
pub use protocol::token::Token;
pub use validator::Validator;

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
