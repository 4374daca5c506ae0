//! File-based key cache with atomic writes.
//!
//! One `<key_id>.json` per key under the cache directory. Writes go to a
//! uniquely named temp file in the same directory and are renamed into
//! place, so concurrent readers in other processes see either the previous
//! record or the new one, never a torn file.

use crate::cache::format::PublicKeyRecord;
use crate::SkillgateError;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Longest key identifier accepted.
pub const MAX_KEY_ID_LEN: usize = 128;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Check a key identifier before it becomes part of a path.
///
/// Allowed: 1-128 characters from `[A-Za-z0-9._-]`, not starting with `.`.
pub fn validate_key_id(key_id: &str) -> Result<(), SkillgateError> {
    let well_formed = !key_id.is_empty()
        && key_id.len() <= MAX_KEY_ID_LEN
        && !key_id.starts_with('.')
        && key_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));

    if well_formed {
        Ok(())
    } else {
        Err(SkillgateError::InvalidKeyId(key_id.to_string()))
    }
}

/// On-disk public key cache.
#[derive(Debug, Clone)]
pub struct KeyCache {
    /// Directory for cache files.
    cache_dir: PathBuf,
}

impl KeyCache {
    /// Cache rooted at `cache_dir`. Nothing touches the disk until the first
    /// read or write; the directory is created by [`KeyCache::put`].
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the record file for a key.
    pub fn key_path(&self, key_id: &str) -> Result<PathBuf, SkillgateError> {
        validate_key_id(key_id)?;
        Ok(self.cache_dir.join(format!("{}.json", key_id)))
    }

    /// Load a key record.
    ///
    /// Returns `Ok(None)` when there is no record, or when the stored record
    /// fails its integrity check (it is logged and ignored so a fresh fetch
    /// can replace it).
    pub fn get(&self, key_id: &str) -> Result<Option<PublicKeyRecord>, SkillgateError> {
        let path = self.key_path(key_id)?;

        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SkillgateError::CacheIO(format!(
                    "Failed to read key record: {}",
                    e
                )))
            }
        };

        let record = match PublicKeyRecord::from_json(&json)
            .and_then(|r| r.verify_integrity(key_id).map(|_| r))
        {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(key_id, path = %path.display(), error = %e, "ignoring corrupted key record");
                return Ok(None);
            }
        };

        Ok(Some(record))
    }

    /// Store a key record, atomically replacing any previous one.
    pub fn put(&self, record: &PublicKeyRecord) -> Result<(), SkillgateError> {
        let target_path = self.key_path(&record.key_id)?;
        let temp_path = self.temp_path(&record.key_id);

        let json = record.to_json()?;

        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| SkillgateError::CacheIO(format!("Failed to create cache dir: {}", e)))?;

        if let Err(e) = write_synced(&temp_path, json.as_bytes()) {
            let _ = fs::remove_file(&temp_path);
            return Err(SkillgateError::CacheIO(format!(
                "Failed to write temp file: {}",
                e
            )));
        }

        if let Err(e) = fs::rename(&temp_path, &target_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(SkillgateError::CacheIO(format!(
                "Failed to rename key record: {}",
                e
            )));
        }

        tracing::debug!(key_id = %record.key_id, path = %target_path.display(), "cached public key");
        Ok(())
    }

    /// Delete a key record.
    pub fn remove(&self, key_id: &str) -> Result<(), SkillgateError> {
        let path = self.key_path(key_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SkillgateError::CacheIO(format!(
                "Failed to delete key record: {}",
                e
            ))),
        }
    }

    /// Delete every key record. Temp files of in-flight writers are left alone.
    pub fn clear(&self) -> Result<(), SkillgateError> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(SkillgateError::CacheIO(format!(
                    "Failed to read cache dir: {}",
                    e
                )))
            }
        };
        for entry in entries {
            let entry = entry
                .map_err(|e| SkillgateError::CacheIO(format!("Failed to read entry: {}", e)))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)
                    .map_err(|e| SkillgateError::CacheIO(format!("Failed to delete: {}", e)))?;
            }
        }
        Ok(())
    }

    /// Unique temp path: `.<key_id>.<pid>.<nanos>.<counter>.tmp`.
    ///
    /// The leading dot keeps it outside the key id namespace.
    fn temp_path(&self, key_id: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.cache_dir.join(format!(
            ".{}.{}.{}.{}.tmp",
            key_id,
            std::process::id(),
            nanos,
            seq
        ))
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
