//! Reqwest-based HTTP client for the key registry.
//!
//! Fetches `GET {registry_url}/public-keys/{key_id}` over TLS and sorts
//! failures into "could not reach the registry" (transport) and "the
//! registry answered with something unusable" (protocol).

use crate::cache::file::validate_key_id;
use crate::client::KeySource;
use crate::config::SkillgateConfig;
use crate::protocol::registry::{parse_registry_response, FetchedKey};
use crate::SkillgateError;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use std::io::Read;
use std::sync::OnceLock;
use std::time::Duration;

/// Largest registry body read before giving up.
pub const MAX_RESPONSE_BYTES: u64 = 64 * 1024;

/// Registry HTTP client.
///
/// The reqwest client is built on the first fetch. Validations that never
/// reach the registry never build one.
pub struct RegistryClient {
    client: OnceLock<Client>,
    fetch_timeout: Duration,
    https_only: bool,
    user_agent: String,
    base_url: String,
}

impl RegistryClient {
    /// Create a new registry client from config.
    pub fn new(config: &SkillgateConfig) -> Result<Self, SkillgateError> {
        config.validate()?;

        Ok(Self {
            client: OnceLock::new(),
            fetch_timeout: config.fetch_timeout,
            https_only: !config.allow_insecure_registry,
            user_agent: build_user_agent(),
            base_url: config.registry_url.trim_end_matches('/').to_string(),
        })
    }

    fn client(&self) -> Result<&Client, SkillgateError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }

        let connect_timeout = self.fetch_timeout.min(Duration::from_secs(3));
        let client = Client::builder()
            .use_rustls_tls()
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .https_only(self.https_only)
            .timeout(self.fetch_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| SkillgateError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        // A concurrent first fetch may have won; either client is equivalent.
        Ok(self.client.get_or_init(|| client))
    }

    /// Registry base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL the key for `key_id` is fetched from.
    pub fn key_url(&self, key_id: &str) -> Result<String, SkillgateError> {
        validate_key_id(key_id)?;
        Ok(format!("{}/public-keys/{}", self.base_url, key_id))
    }

    fn get(&self, key_id: &str) -> Result<Vec<u8>, SkillgateError> {
        let url = self.key_url(key_id)?;
        tracing::debug!(key_id, url = %url, "fetching public key");

        let response = self
            .client()?
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| SkillgateError::RegistryTransport(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, key_id));
        }

        let mut body = Vec::new();
        response
            .take(MAX_RESPONSE_BYTES + 1)
            .read_to_end(&mut body)
            .map_err(|e| SkillgateError::RegistryTransport(format!("Failed to read body: {}", e)))?;

        if body.len() as u64 > MAX_RESPONSE_BYTES {
            return Err(SkillgateError::RegistryProtocol(format!(
                "registry response larger than {} bytes",
                MAX_RESPONSE_BYTES
            )));
        }
        Ok(body)
    }
}

impl KeySource for RegistryClient {
    fn fetch_key(&self, key_id: &str) -> Result<FetchedKey, SkillgateError> {
        let body = self.get(key_id)?;
        let key = parse_registry_response(&body)?;
        tracing::info!(key_id, algorithm = %key.algorithm, "fetched public key from registry");
        Ok(key)
    }
}

/// Map a non-success status to a registry error.
///
/// Server errors and rate limiting mean the registry is not serving right
/// now (transport); everything else is a definite answer (protocol).
pub fn classify_status(status: StatusCode, key_id: &str) -> SkillgateError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        SkillgateError::RegistryTransport(format!("registry returned {} for {}", status, key_id))
    } else {
        SkillgateError::RegistryProtocol(format!("registry returned {} for {}", status, key_id))
    }
}

/// Build the User-Agent string.
///
/// Format: `skillgate/<version>`
pub fn build_user_agent() -> String {
    format!("skillgate/{}", env!("CARGO_PKG_VERSION"))
}
