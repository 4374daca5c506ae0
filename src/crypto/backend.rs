//! The closed set of signature verification backends.
//!
//! Backends are tried in the order the verifier declares them. A backend
//! that does not implement the token's algorithm is skipped; the first one
//! that does gives the final answer. Every backend receives the same
//! [`SignedInput`], built once from the original token segments.

use crate::SkillgateError;
use jsonwebtoken::{Algorithm, DecodingKey};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use sha2::Sha256;
use std::str::FromStr;

/// Smallest RSA modulus accepted, in bits.
pub const MIN_RSA_BITS: usize = 2048;

/// Byte-exact verification input shared by every backend.
#[derive(Debug, Clone, Copy)]
pub struct SignedInput<'a> {
    /// Algorithm declared in the token header.
    pub algorithm: &'a str,
    /// `header_segment.payload_segment`, untouched.
    pub message: &'a [u8],
    /// Decoded signature bytes.
    pub signature: &'a [u8],
    /// Signature segment exactly as it appeared in the token.
    pub encoded_signature: &'a str,
}

/// A signature verification implementation.
pub trait SignatureBackend: Send + Sync {
    /// Stable backend name for logs.
    fn name(&self) -> &'static str;

    /// Whether this backend implements `algorithm`.
    fn supports(&self, algorithm: &str) -> bool;

    /// Verify `input` against a PEM public key.
    ///
    /// Every failure, including an unparseable key, is
    /// [`SkillgateError::SignatureInvalid`].
    fn verify(&self, input: &SignedInput<'_>, pem: &str) -> Result<(), SkillgateError>;
}

/// RS256 via the RustCrypto `rsa` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoRsa;

impl RustCryptoRsa {
    fn decode_public_key(pem: &str) -> Result<RsaPublicKey, SkillgateError> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| {
                tracing::debug!(error = %e, "rsa backend could not decode public key");
                SkillgateError::SignatureInvalid
            })?;

        let bits = key.size() * 8;
        if bits < MIN_RSA_BITS {
            tracing::debug!(bits, "rsa key below minimum size");
            return Err(SkillgateError::SignatureInvalid);
        }
        Ok(key)
    }
}

impl SignatureBackend for RustCryptoRsa {
    fn name(&self) -> &'static str {
        "rustcrypto-rsa"
    }

    fn supports(&self, algorithm: &str) -> bool {
        algorithm == "RS256"
    }

    fn verify(&self, input: &SignedInput<'_>, pem: &str) -> Result<(), SkillgateError> {
        let public_key = Self::decode_public_key(pem)?;
        let verifying_key = VerifyingKey::<Sha256>::new(public_key);

        let signature =
            Signature::try_from(input.signature).map_err(|_| SkillgateError::SignatureInvalid)?;

        verifying_key
            .verify(input.message, &signature)
            .map_err(|_| SkillgateError::SignatureInvalid)
    }
}

/// RS256/RS384/RS512 via the `jsonwebtoken` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWebToken;

impl SignatureBackend for JsonWebToken {
    fn name(&self) -> &'static str {
        "jsonwebtoken"
    }

    fn supports(&self, algorithm: &str) -> bool {
        matches!(algorithm, "RS256" | "RS384" | "RS512")
    }

    fn verify(&self, input: &SignedInput<'_>, pem: &str) -> Result<(), SkillgateError> {
        let algorithm =
            Algorithm::from_str(input.algorithm).map_err(|_| SkillgateError::SignatureInvalid)?;

        let key = DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
            tracing::debug!(error = %e, "jsonwebtoken backend could not decode public key");
            SkillgateError::SignatureInvalid
        })?;

        match jsonwebtoken::crypto::verify(input.encoded_signature, input.message, &key, algorithm) {
            Ok(true) => Ok(()),
            Ok(false) => Err(SkillgateError::SignatureInvalid),
            Err(e) => {
                tracing::debug!(error = %e, "jsonwebtoken backend rejected signature");
                Err(SkillgateError::SignatureInvalid)
            }
        }
    }
}
