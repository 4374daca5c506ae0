//! License artifact loading.
//!
//! An artifact is a small JSON document with at least a `token` string:
//!
//! ```json
//! { "token": "eyJhbGciOiJSUzI1NiJ9.eyJleHAiOjE3NTAwMDAwMDB9.c2ln", "installed_at": "..." }
//! ```

use crate::SkillgateError;
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Upper bound on artifact size; anything larger is not a license file.
pub const MAX_ARTIFACT_BYTES: u64 = 64 * 1024;

/// A persisted license: one signed token plus whatever local metadata the
/// installer wrote next to it.
#[derive(Debug, Clone)]
pub struct LicenseArtifact {
    /// The compact signed token.
    pub token: String,

    /// All other top-level fields, untouched.
    pub metadata: Map<String, Value>,
}

impl LicenseArtifact {
    /// Read an artifact from disk.
    ///
    /// # Errors
    /// - `ArtifactMissing` - file absent, or `token` absent/empty
    /// - `ArtifactInvalid` - not a JSON object, or `token` is not a string
    /// - `CacheIO` - the file exists but could not be read
    pub fn load(path: &Path) -> Result<Self, SkillgateError> {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SkillgateError::ArtifactMissing(path.display().to_string()));
            }
            Err(e) => {
                return Err(SkillgateError::CacheIO(format!(
                    "Failed to stat {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        if !metadata.is_file() {
            return Err(SkillgateError::ArtifactInvalid(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        if metadata.len() > MAX_ARTIFACT_BYTES {
            return Err(SkillgateError::ArtifactInvalid(format!(
                "{} is {} bytes, larger than {}",
                path.display(),
                metadata.len(),
                MAX_ARTIFACT_BYTES
            )));
        }

        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SkillgateError::ArtifactMissing(path.display().to_string()));
            }
            Err(e) => {
                return Err(SkillgateError::CacheIO(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        Self::from_slice(&bytes)
    }

    /// Parse artifact JSON.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SkillgateError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| SkillgateError::ArtifactInvalid(format!("not valid JSON: {e}")))?;

        let Value::Object(mut fields) = value else {
            return Err(SkillgateError::ArtifactInvalid(
                "top level is not a JSON object".to_string(),
            ));
        };

        let token = match fields.remove("token") {
            None | Some(Value::Null) => {
                return Err(SkillgateError::ArtifactMissing(
                    "artifact has no token field".to_string(),
                ));
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(SkillgateError::ArtifactMissing(
                    "artifact token is empty".to_string(),
                ));
            }
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => {
                return Err(SkillgateError::ArtifactInvalid(format!(
                    "token must be a string, found {}",
                    json_type(&other)
                )));
            }
        };

        Ok(Self {
            token,
            metadata: fields,
        })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
