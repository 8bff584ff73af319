//! Object checksums: BLAKE3 truncated to 128 bits (32 hex chars).
//!
//! The checksum is computed over all chunk payloads in ascending index order
//! and stored in the object record for verification on reassembly. The
//! 128-bit truncation keeps digests compact while providing more than enough
//! collision resistance for corruption detection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Hex digest length of a truncated BLAKE3 checksum.
const HEX_LEN: usize = 32;

/// A content checksum - 128 bits (16 bytes, 32 hex chars) of BLAKE3.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

/// Errors that can occur when parsing a checksum string.
#[derive(Debug, Error)]
pub enum ChecksumError {
    #[error("invalid checksum length: expected 32 hex chars, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex character in checksum")]
    InvalidHex,
}

impl Checksum {
    /// Checksum a complete byte slice in one shot.
    pub fn from_data(data: &[u8]) -> Self {
        let mut builder = ChecksumBuilder::new();
        builder.update(data);
        builder.finish()
    }

    /// Create from an existing digest string (validates format).
    pub fn from_str_checked(s: &str) -> Result<Self, ChecksumError> {
        if s.len() != HEX_LEN {
            return Err(ChecksumError::InvalidLength(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChecksumError::InvalidHex);
        }
        Ok(Self(s.to_lowercase()))
    }

    /// Get the digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Checksum {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_checked(s)
    }
}

impl AsRef<str> for Checksum {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Incremental checksum accumulation.
///
/// Both the write path (hashing chunks as they are cut) and the read path
/// (hashing chunks as they are fetched) feed slices through a builder so the
/// whole object never has to be contiguous in memory for hashing.
#[derive(Debug, Clone, Default)]
pub struct ChecksumBuilder {
    inner: blake3::Hasher,
}

impl ChecksumBuilder {
    /// Start a fresh accumulation.
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    /// Feed the next slice of content.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Produce the digest over everything fed so far.
    ///
    /// Non-consuming, so the read path can verify mid-stream state in tests.
    pub fn finish(&self) -> Checksum {
        let digest = self.inner.finalize();
        Checksum(hex::encode(&digest.as_bytes()[..HEX_LEN / 2]))
    }
}
