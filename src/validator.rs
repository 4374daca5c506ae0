//! Validator - the main public API for Skillgate.
//!
//! The `Validator` runs one pass per call:
//! - load the artifact and parse its token
//! - resolve the signing key (cache, registry, stale fallback)
//! - verify the signature
//! - only then evaluate expiry
//!
//! Every call re-reads the artifact and key cache; nothing is kept in
//! memory between calls.

use crate::client::{KeySource, RegistryClient};
use crate::clock::{Clock, SystemClock};
use crate::config::SkillgateConfig;
use crate::crypto::verify::{validate_algorithm, SignatureVerifier};
use crate::fetcher::{KeyFetcher, KeyOrigin, ResolveOptions, ResolvedKey};
use crate::outcome::{SignatureVerdict, ValidationReport};
use crate::policy::expiry;
use crate::protocol::artifact::LicenseArtifact;
use crate::protocol::token::Token;
use crate::SkillgateError;
use std::path::Path;
use std::sync::Arc;

/// Main validator for Skillgate.
pub struct Validator {
    config: SkillgateConfig,
    clock: Arc<dyn Clock>,
    fetcher: KeyFetcher,
    verifier: SignatureVerifier,
}

impl Validator {
    /// Create a validator with the registry client and the system clock.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration does not validate.
    pub fn new(config: SkillgateConfig) -> Result<Self, SkillgateError> {
        config.validate()?;
        let source: Arc<dyn KeySource> = Arc::new(RegistryClient::new(&config)?);
        Ok(Self::with_components(config, Arc::new(SystemClock), source))
    }

    /// Create a validator with an injected clock and key source.
    pub fn with_components(
        config: SkillgateConfig,
        clock: Arc<dyn Clock>,
        source: Arc<dyn KeySource>,
    ) -> Self {
        let fetcher = KeyFetcher::with_components(&config, Arc::clone(&clock), source);
        Self {
            config,
            clock,
            fetcher,
            verifier: SignatureVerifier::default(),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &SkillgateConfig {
        &self.config
    }

    /// Validate the artifact at `path`.
    pub fn validate(&self, path: &Path) -> ValidationReport {
        self.run_artifact(path, ResolveOptions::default())
    }

    /// Validate a raw token string.
    pub fn validate_token(&self, raw: &str) -> ValidationReport {
        self.run_token(raw, ResolveOptions::default())
    }

    /// Evaluate the artifact's expiry without touching the network.
    ///
    /// The signature is still verified first, against a cached key only.
    pub fn check_expiry(&self, path: &Path) -> ValidationReport {
        self.run_artifact(path, ResolveOptions::offline())
    }

    /// Verify a token's signature and report the key used.
    pub fn check_signature(&self, raw: &str) -> Result<ResolvedKey, SkillgateError> {
        let token = Token::parse(raw)?;
        validate_algorithm(token.algorithm())?;
        let resolved = self.resolve_for(&token, ResolveOptions::default())?;
        self.verifier.check_record(&token, &resolved.record)?;
        Ok(resolved)
    }

    /// Verify a token's signature, folded into a verdict.
    pub fn verify_signature(&self, raw: &str) -> SignatureVerdict {
        match self.check_signature(raw) {
            Ok(_) => SignatureVerdict::Verified,
            Err(e) => {
                tracing::debug!(error = %e, "signature check failed");
                SignatureVerdict::from_error(&e)
            }
        }
    }

    /// Resolve a public key by id.
    pub fn get_public_key(
        &self,
        key_id: &str,
        options: ResolveOptions,
    ) -> Result<ResolvedKey, SkillgateError> {
        self.fetcher.resolve(key_id, options)
    }

    fn run_artifact(&self, path: &Path, options: ResolveOptions) -> ValidationReport {
        match LicenseArtifact::load(path) {
            Ok(artifact) => self.run_token(&artifact.token, options),
            Err(e) => self.failure(&e, None),
        }
    }

    fn run_token(&self, raw: &str, options: ResolveOptions) -> ValidationReport {
        let token = match Token::parse(raw) {
            Ok(token) => token,
            Err(e) => return self.failure(&e, None),
        };

        if let Err(e) = validate_algorithm(token.algorithm()) {
            return self.failure(&e, None);
        }

        let resolved = match self.resolve_for(&token, options) {
            Ok(resolved) => resolved,
            Err(e) => return self.failure(&e, None),
        };
        let origin = Some(resolved.origin);

        // Expiry is only ever evaluated past this point.
        if let Err(e) = self.verifier.check_record(&token, &resolved.record) {
            return self.failure(&e, origin);
        }

        match expiry::evaluate(token.payload(), &self.config.grace, self.clock.as_ref()) {
            Ok((claims, status)) => {
                let report = ValidationReport {
                    outcome: status.into(),
                    claims: Some(claims),
                    key_origin: origin,
                    detail: None,
                };
                tracing::info!(
                    status = report.outcome.status(),
                    key_id = token.key_id(),
                    key_origin = %resolved.origin,
                    "license validated"
                );
                report
            }
            Err(e) => self.failure(&e, origin),
        }
    }

    /// Resolve the key a token names. A bad key id is a token defect.
    fn resolve_for(&self, token: &Token, options: ResolveOptions) -> Result<ResolvedKey, SkillgateError> {
        self.fetcher
            .resolve(token.key_id(), options)
            .map_err(|e| match e {
                SkillgateError::InvalidKeyId(kid) => {
                    SkillgateError::MalformedToken(format!("header kid {kid:?} is not a valid key id"))
                }
                other => other,
            })
    }

    fn failure(&self, error: &SkillgateError, origin: Option<KeyOrigin>) -> ValidationReport {
        let report = ValidationReport::failed(error, origin);
        tracing::debug!(status = report.outcome.status(), error = %error, "license rejected");
        report
    }
}
