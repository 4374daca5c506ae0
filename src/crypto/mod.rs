//! Cryptographic primitives for token verification.

pub mod backend;
pub mod digest;
pub mod verify;
