//! Public key resolution: cache first, registry when needed.
//!
//! Resolution order for a key id:
//! 1. fresh cached record (unless a refresh is forced)
//! 2. offline mode: any cached record, fresh or not
//! 3. registry fetch, stored before it is returned
//! 4. registry unreachable: the stale cached record, with a warning
//!
//! A registry that answers with a rejection never falls back to the cache.

use crate::cache::file::{validate_key_id, KeyCache};
use crate::cache::format::PublicKeyRecord;
use crate::client::{KeySource, RegistryClient};
use crate::clock::{Clock, SystemClock};
use crate::config::{default_cache_dir, SkillgateConfig};
use crate::SkillgateError;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Per-call resolution switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Skip the freshness shortcut and go to the registry.
    pub force_refresh: bool,
    /// Never touch the network. Wins over `force_refresh`.
    pub offline_only: bool,
}

impl ResolveOptions {
    /// Options for a forced registry refresh.
    pub fn refresh() -> Self {
        Self {
            force_refresh: true,
            offline_only: false,
        }
    }

    /// Options for cache-only resolution.
    pub fn offline() -> Self {
        Self {
            force_refresh: false,
            offline_only: true,
        }
    }
}

/// Where a resolved key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyOrigin {
    /// Fresh cached record.
    Cache,
    /// Cached record used because the network is off limits.
    OfflineCache,
    /// Just fetched from the registry.
    Network,
    /// Cached record used because the registry was unreachable.
    StaleCache,
}

impl KeyOrigin {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyOrigin::Cache => "cache",
            KeyOrigin::OfflineCache => "offline_cache",
            KeyOrigin::Network => "network",
            KeyOrigin::StaleCache => "stale_cache",
        }
    }
}

impl std::fmt::Display for KeyOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key ready for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    /// The key record.
    pub record: PublicKeyRecord,
    /// How it was obtained.
    pub origin: KeyOrigin,
}

/// Resolves key ids to public keys.
pub struct KeyFetcher {
    cache_dir: Option<PathBuf>,
    source: Arc<dyn KeySource>,
    clock: Arc<dyn Clock>,
    max_age: Duration,
    offline_only: bool,
}

impl KeyFetcher {
    /// Fetcher backed by the configured registry and the system clock.
    pub fn new(config: &SkillgateConfig) -> Result<Self, SkillgateError> {
        let source: Arc<dyn KeySource> = Arc::new(RegistryClient::new(config)?);
        Ok(Self::with_components(config, Arc::new(SystemClock), source))
    }

    /// Fetcher with an injected clock and key source.
    ///
    /// The cache directory is not resolved or created until a key is
    /// actually looked up.
    pub fn with_components(
        config: &SkillgateConfig,
        clock: Arc<dyn Clock>,
        source: Arc<dyn KeySource>,
    ) -> Self {
        Self {
            cache_dir: config.cache_dir.clone(),
            source,
            clock,
            max_age: config.key_max_age,
            offline_only: config.offline_only,
        }
    }

    /// The underlying cache.
    pub fn cache(&self) -> Result<KeyCache, SkillgateError> {
        let dir = match &self.cache_dir {
            Some(dir) => dir.clone(),
            None => default_cache_dir()?,
        };
        Ok(KeyCache::new(dir))
    }

    /// Resolve `key_id` to a usable public key.
    ///
    /// # Errors
    /// * `InvalidKeyId` - `key_id` is not allowed as a cache/registry name
    /// * `KeyUnavailable` - no cached key and the registry could not supply one
    /// * `CacheIO` - the cache could not be read or the fetched key not stored
    pub fn resolve(&self, key_id: &str, options: ResolveOptions) -> Result<ResolvedKey, SkillgateError> {
        validate_key_id(key_id)?;

        let cache = self.cache()?;
        let cached = cache.get(key_id)?;
        let offline = options.offline_only || self.offline_only;

        if let Some(record) = &cached {
            if !options.force_refresh && !offline && record.is_fresh(self.max_age, self.clock.as_ref()) {
                tracing::debug!(key_id, "using fresh cached key");
                return Ok(ResolvedKey {
                    record: record.clone(),
                    origin: KeyOrigin::Cache,
                });
            }
        }

        if offline {
            return match cached {
                Some(record) => {
                    tracing::debug!(key_id, "offline: using cached key");
                    Ok(ResolvedKey {
                        record,
                        origin: KeyOrigin::OfflineCache,
                    })
                }
                None => Err(SkillgateError::KeyUnavailable(format!(
                    "no cached key for {key_id} and network access is disabled"
                ))),
            };
        }

        match self.source.fetch_key(key_id) {
            Ok(fetched) => {
                let record = PublicKeyRecord::new(key_id, fetched, self.clock.as_ref());
                cache.put(&record)?;
                Ok(ResolvedKey {
                    record,
                    origin: KeyOrigin::Network,
                })
            }
            Err(e) if e.is_network_failure() => match cached {
                Some(record) => {
                    tracing::warn!(
                        key_id,
                        age_secs = record.age(self.clock.as_ref()).num_seconds(),
                        error = %e,
                        "registry unreachable, using stale cached key"
                    );
                    Ok(ResolvedKey {
                        record,
                        origin: KeyOrigin::StaleCache,
                    })
                }
                None => Err(SkillgateError::KeyUnavailable(format!(
                    "registry unreachable and no cached key for {key_id}: {e}"
                ))),
            },
            Err(e) => {
                tracing::warn!(key_id, error = %e, "registry refused key request");
                Err(SkillgateError::KeyUnavailable(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::protocol::registry::FetchedKey;
    use crate::test_support::{MockKeySource, PRIMARY_PUBLIC_PEM, ROTATED_PUBLIC_PEM};
    use tempfile::TempDir;

    const T0: i64 = 1_750_000_000;
    const HOUR: i64 = 3600;

    fn config(dir: &TempDir) -> SkillgateConfig {
        SkillgateConfig {
            cache_dir: Some(dir.path().to_path_buf()),
            key_max_age: Duration::from_secs(6 * 3600),
            ..SkillgateConfig::default()
        }
    }

    fn fetcher(dir: &TempDir, at: i64, source: &Arc<MockKeySource>) -> KeyFetcher {
        let source: Arc<dyn KeySource> = Arc::clone(source) as Arc<dyn KeySource>;
        KeyFetcher::with_components(&config(dir), Arc::new(MockClock::at_unix(at)), source)
    }

    fn seed(dir: &TempDir, key_id: &str, pem: &str, fetched_at: i64) -> PublicKeyRecord {
        let record = PublicKeyRecord::new(
            key_id,
            FetchedKey {
                pem: pem.to_string(),
                algorithm: "RS256".to_string(),
                expires_at: None,
            },
            &MockClock::at_unix(fetched_at),
        );
        KeyCache::new(dir.path()).put(&record).unwrap();
        record
    }

    #[test]
    fn fresh_cache_skips_network() {
        let dir = TempDir::new().unwrap();
        let seeded = seed(&dir, "primary", PRIMARY_PUBLIC_PEM, T0);
        let source = Arc::new(MockKeySource::unreachable());

        let resolved = fetcher(&dir, T0 + HOUR, &source)
            .resolve("primary", ResolveOptions::default())
            .unwrap();

        assert_eq!(resolved.origin, KeyOrigin::Cache);
        assert_eq!(resolved.record, seeded);
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn stale_cache_is_refreshed_and_stored() {
        let dir = TempDir::new().unwrap();
        seed(&dir, "primary", ROTATED_PUBLIC_PEM, T0);
        let source = Arc::new(MockKeySource::serving("primary", PRIMARY_PUBLIC_PEM));

        let resolved = fetcher(&dir, T0 + 7 * HOUR, &source)
            .resolve("primary", ResolveOptions::default())
            .unwrap();

        assert_eq!(resolved.origin, KeyOrigin::Network);
        assert_eq!(resolved.record.pem_material, PRIMARY_PUBLIC_PEM);
        assert_eq!(source.calls(), 1);

        let stored = KeyCache::new(dir.path()).get("primary").unwrap().unwrap();
        assert_eq!(stored, resolved.record);
        assert_eq!(stored.fetched_at.timestamp(), T0 + 7 * HOUR);
    }

    #[test]
    fn unreachable_registry_falls_back_to_stale_key() {
        let dir = TempDir::new().unwrap();
        let seeded = seed(&dir, "primary", PRIMARY_PUBLIC_PEM, T0);
        let source = Arc::new(MockKeySource::unreachable());

        let resolved = fetcher(&dir, T0 + 48 * HOUR, &source)
            .resolve("primary", ResolveOptions::default())
            .unwrap();

        assert_eq!(resolved.origin, KeyOrigin::StaleCache);
        assert_eq!(resolved.record, seeded);
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn registry_rejection_does_not_fall_back() {
        let dir = TempDir::new().unwrap();
        seed(&dir, "primary", PRIMARY_PUBLIC_PEM, T0);
        let source = Arc::new(MockKeySource::serving("other", PRIMARY_PUBLIC_PEM));

        let result = fetcher(&dir, T0 + 48 * HOUR, &source).resolve("primary", ResolveOptions::default());
        assert!(matches!(result, Err(SkillgateError::KeyUnavailable(_))));
    }

    #[test]
    fn nothing_cached_and_no_network_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockKeySource::unreachable());

        let result = fetcher(&dir, T0, &source).resolve("primary", ResolveOptions::default());
        assert!(matches!(result, Err(SkillgateError::KeyUnavailable(_))));
    }

    #[test]
    fn force_refresh_bypasses_fresh_cache() {
        let dir = TempDir::new().unwrap();
        seed(&dir, "primary", ROTATED_PUBLIC_PEM, T0);
        let source = Arc::new(MockKeySource::serving("primary", PRIMARY_PUBLIC_PEM));

        let resolved = fetcher(&dir, T0 + 60, &source)
            .resolve("primary", ResolveOptions::refresh())
            .unwrap();

        assert_eq!(resolved.origin, KeyOrigin::Network);
        assert_eq!(resolved.record.pem_material, PRIMARY_PUBLIC_PEM);
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn offline_uses_any_cached_key_and_never_calls_out() {
        let dir = TempDir::new().unwrap();
        seed(&dir, "primary", PRIMARY_PUBLIC_PEM, T0);
        let source = Arc::new(MockKeySource::serving("primary", ROTATED_PUBLIC_PEM));
        let fetcher = fetcher(&dir, T0 + 30 * 24 * HOUR, &source);

        let options = ResolveOptions {
            force_refresh: true,
            offline_only: true,
        };
        let resolved = fetcher.resolve("primary", options).unwrap();
        assert_eq!(resolved.origin, KeyOrigin::OfflineCache);
        assert_eq!(resolved.record.pem_material, PRIMARY_PUBLIC_PEM);

        assert!(matches!(
            fetcher.resolve("absent", ResolveOptions::offline()),
            Err(SkillgateError::KeyUnavailable(_))
        ));
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn offline_config_applies_to_every_call() {
        let dir = TempDir::new().unwrap();
        let source: Arc<dyn KeySource> = Arc::new(MockKeySource::serving("primary", PRIMARY_PUBLIC_PEM));
        let config = SkillgateConfig {
            offline_only: true,
            ..config(&dir)
        };
        let fetcher =
            KeyFetcher::with_components(&config, Arc::new(MockClock::at_unix(T0)), source);

        assert!(matches!(
            fetcher.resolve("primary", ResolveOptions::default()),
            Err(SkillgateError::KeyUnavailable(_))
        ));
    }

    #[test]
    fn corrupted_cache_entry_is_refetched() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("primary.json"), "not json").unwrap();
        let source = Arc::new(MockKeySource::serving("primary", PRIMARY_PUBLIC_PEM));

        let resolved = fetcher(&dir, T0, &source)
            .resolve("primary", ResolveOptions::default())
            .unwrap();
        assert_eq!(resolved.origin, KeyOrigin::Network);
    }

    #[test]
    fn invalid_key_id_is_rejected_before_any_io() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockKeySource::serving("primary", PRIMARY_PUBLIC_PEM));

        let result = fetcher(&dir, T0, &source).resolve("../primary", ResolveOptions::default());
        assert!(matches!(result, Err(SkillgateError::InvalidKeyId(_))));
        assert_eq!(source.calls(), 0);
    }
}
