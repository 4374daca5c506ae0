//! Wire and on-disk formats: tokens, license artifacts, registry responses.

pub mod artifact;
pub mod registry;
pub mod token;
