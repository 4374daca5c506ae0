//! Skillgate configuration.
//!
//! Everything here is consumed from the environment by the binary; library
//! users can also build a [`SkillgateConfig`] directly.

use crate::policy::expiry::GraceTable;
use crate::SkillgateError;
use std::path::PathBuf;
use std::time::Duration;

/// Overrides the key cache directory.
pub const ENV_CACHE_DIR: &str = "SKILLGATE_CACHE_DIR";
/// Overrides the registry base URL.
pub const ENV_REGISTRY_URL: &str = "SKILLGATE_REGISTRY_URL";
/// Forces offline-only key resolution when truthy.
pub const ENV_OFFLINE: &str = "SKILLGATE_OFFLINE";
/// Per-tier grace hours, e.g. `free=24,pro=72`.
pub const ENV_GRACE_HOURS: &str = "SKILLGATE_GRACE_HOURS";
/// Maximum age of a cached key before it is refreshed, in hours.
pub const ENV_KEY_MAX_AGE_HOURS: &str = "SKILLGATE_KEY_MAX_AGE_HOURS";

/// Default registry serving `/public-keys/{key_id}`.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.skillgate.dev";

/// Default freshness window for cached keys.
pub const DEFAULT_KEY_MAX_AGE: Duration = Duration::from_secs(6 * 60 * 60);

/// Default registry request timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for license validation.
#[derive(Debug, Clone)]
pub struct SkillgateConfig {
    /// Key cache directory. `None` means `dirs::cache_dir()/skillgate/keys`.
    pub cache_dir: Option<PathBuf>,

    /// Registry base URL (without the `/public-keys` suffix).
    pub registry_url: String,

    /// Never contact the registry; use cached keys even when stale.
    pub offline_only: bool,

    /// Grace window per tier.
    pub grace: GraceTable,

    /// Cached keys older than this are refreshed before use.
    pub key_max_age: Duration,

    /// Registry request timeout. Must stay in single-digit seconds.
    pub fetch_timeout: Duration,

    /// Permit plain `http://` registries. Only for local test registries.
    pub allow_insecure_registry: bool,
}

impl Default for SkillgateConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            offline_only: false,
            grace: GraceTable::default(),
            key_max_age: DEFAULT_KEY_MAX_AGE,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            allow_insecure_registry: false,
        }
    }
}

impl SkillgateConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self, SkillgateError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SkillgateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get(ENV_CACHE_DIR) {
            config.cache_dir = Some(PathBuf::from(dir));
        }

        if let Some(url) = get(ENV_REGISTRY_URL) {
            config.registry_url = url.trim().to_string();
        }

        if let Some(flag) = get(ENV_OFFLINE) {
            config.offline_only = parse_flag(ENV_OFFLINE, &flag)?;
        }

        if let Some(table) = get(ENV_GRACE_HOURS) {
            config.grace = config.grace.with_overrides(&table)?;
        }

        if let Some(hours) = get(ENV_KEY_MAX_AGE_HOURS) {
            let hours: u64 = hours.trim().parse().map_err(|_| {
                SkillgateError::ConfigError(format!(
                    "{ENV_KEY_MAX_AGE_HOURS} must be a whole number of hours, got {hours:?}"
                ))
            })?;
            config.key_max_age = Duration::from_secs(hours.saturating_mul(60 * 60));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), SkillgateError> {
        let url = self.registry_url.as_str();
        if url.is_empty() {
            return Err(SkillgateError::ConfigError(
                "registry_url cannot be empty".to_string(),
            ));
        }
        if !url.starts_with("https://") && !(self.allow_insecure_registry && url.starts_with("http://")) {
            return Err(SkillgateError::ConfigError(format!(
                "registry_url must use https://, got {url}"
            )));
        }
        if self.key_max_age.is_zero() {
            return Err(SkillgateError::ConfigError(
                "key_max_age must be positive".to_string(),
            ));
        }
        let timeout = self.fetch_timeout.as_secs_f64();
        if !(1.0..10.0).contains(&timeout) {
            return Err(SkillgateError::ConfigError(format!(
                "fetch_timeout must be between 1 and 9 seconds, got {timeout}s"
            )));
        }
        Ok(())
    }

    /// Resolved key cache directory.
    pub fn resolved_cache_dir(&self) -> Result<PathBuf, SkillgateError> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_cache_dir(),
        }
    }
}

/// Per-user key cache directory, `<cache>/skillgate/keys`.
pub fn default_cache_dir() -> Result<PathBuf, SkillgateError> {
    let base = dirs::cache_dir()
        .ok_or_else(|| SkillgateError::CacheIO("Could not find cache directory".to_string()))?;
    Ok(base.join("skillgate").join("keys"))
}

fn parse_flag(name: &str, value: &str) -> Result<bool, SkillgateError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(SkillgateError::ConfigError(format!(
            "{name} must be a boolean, got {other:?}"
        ))),
    }
}
