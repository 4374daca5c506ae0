//! Compact signed token codec.
//!
//! A token is `base64url(header).base64url(payload).base64url(signature)`.
//! The signature covers the first two segments exactly as they appear in the
//! original string, so [`Token::signing_input`] slices the raw string instead
//! of re-encoding anything that was decoded.

use crate::SkillgateError;
use base64::{engine::general_purpose::URL_SAFE, Engine};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Key id used when the header carries none.
pub const DEFAULT_KEY_ID: &str = "default";

/// Decoded token header.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signature algorithm, e.g. `RS256`.
    pub alg: String,

    /// Key identifier selecting the verification key.
    #[serde(default)]
    pub kid: Option<String>,

    /// Token type, usually `JWT`.
    #[serde(default)]
    pub typ: Option<String>,
}

/// A parsed, never-mutated compact signed token.
#[derive(Debug, Clone)]
pub struct Token {
    raw: String,
    /// Byte offset of the first `.`.
    header_end: usize,
    /// Byte offset of the second `.`.
    payload_end: usize,
    header: TokenHeader,
    payload: Map<String, Value>,
    signature: Vec<u8>,
}

impl Token {
    /// Parse a raw compact token.
    ///
    /// Requires exactly three non-empty segments over the URL-safe base64
    /// alphabet, a JSON-object header with `alg`, and a JSON-object payload.
    pub fn parse(raw: &str) -> Result<Self, SkillgateError> {
        let raw = raw.trim();
        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() != 3 {
            return Err(SkillgateError::MalformedToken(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        }

        for (name, segment) in ["header", "payload", "signature"].iter().zip(&segments) {
            if segment.is_empty() {
                return Err(SkillgateError::MalformedToken(format!("{name} segment is empty")));
            }
            if !is_token_safe(segment) {
                return Err(SkillgateError::MalformedToken(format!(
                    "{name} segment contains characters outside the base64url alphabet"
                )));
            }
        }

        let header_bytes = decode_segment(segments[0])?;
        let header: TokenHeader = serde_json::from_slice(&header_bytes)
            .map_err(|e| SkillgateError::MalformedToken(format!("header is not valid JSON: {e}")))?;

        let payload_bytes = decode_segment(segments[1])?;
        let payload: Map<String, Value> = serde_json::from_slice(&payload_bytes).map_err(|e| {
            SkillgateError::MalformedToken(format!("payload is not a JSON object: {e}"))
        })?;

        let signature = decode_segment(segments[2])?;

        let header_end = segments[0].len();
        let payload_end = header_end + 1 + segments[1].len();

        Ok(Self {
            raw: raw.to_string(),
            header_end,
            payload_end,
            header,
            payload,
            signature,
        })
    }

    /// The exact bytes that were signed: `header_segment.payload_segment`.
    pub fn signing_input(&self) -> &[u8] {
        self.raw[..self.payload_end].as_bytes()
    }

    /// Key identifier from the header, or [`DEFAULT_KEY_ID`].
    pub fn key_id(&self) -> &str {
        match self.header.kid.as_deref() {
            Some(kid) if !kid.is_empty() => kid,
            _ => DEFAULT_KEY_ID,
        }
    }

    /// Declared signature algorithm.
    pub fn algorithm(&self) -> &str {
        &self.header.alg
    }

    /// Decoded header.
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    /// Decoded payload claims. Unverified until the signature check passes.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Raw signature bytes.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Original header segment.
    pub fn header_segment(&self) -> &str {
        &self.raw[..self.header_end]
    }

    /// Original payload segment.
    pub fn payload_segment(&self) -> &str {
        &self.raw[self.header_end + 1..self.payload_end]
    }

    /// Original signature segment.
    pub fn signature_segment(&self) -> &str {
        &self.raw[self.payload_end + 1..]
    }

    /// The token exactly as parsed (surrounding whitespace removed).
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Whether every byte is in the URL-safe base64 alphabet (no padding).
pub fn is_token_safe(segment: &str) -> bool {
    segment
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Decode one URL-safe segment, restoring the `=` padding it was sent without.
pub fn decode_segment(segment: &str) -> Result<Vec<u8>, SkillgateError> {
    if segment.len() % 4 == 1 {
        return Err(SkillgateError::MalformedToken(format!(
            "segment length {} is not valid base64",
            segment.len()
        )));
    }
    let padding = (4 - segment.len() % 4) % 4;
    let mut padded = String::with_capacity(segment.len() + padding);
    padded.push_str(segment);
    padded.extend(std::iter::repeat('=').take(padding));

    URL_SAFE
        .decode(padded.as_bytes())
        .map_err(|e| SkillgateError::MalformedToken(format!("invalid base64url segment: {e}")))
}
