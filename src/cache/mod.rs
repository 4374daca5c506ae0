//! On-disk public key cache.

pub mod file;
pub mod format;

pub use file::{validate_key_id, KeyCache};
pub use format::PublicKeyRecord;
