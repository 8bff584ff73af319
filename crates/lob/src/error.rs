//! Error taxonomy for object store operations.
//!
//! Every operation detects its own failure locally and converts it into
//! exactly one of these kinds. The `raise_on_error` toggle on
//! [`LobConfig`](crate::config::LobConfig) controls only how a failure is
//! surfaced (error vs. log-and-return-falsy), never which conditions are
//! detected.

use thiserror::Error;

/// Result type alias for lob operations.
pub type Result<T> = std::result::Result<T, LobError>;

/// Errors that can occur while storing, fetching, or deleting objects.
#[derive(Debug, Error)]
pub enum LobError {
    /// Source larger than `max_file_size`, or a key so long that no chunk
    /// payload fits under `max_chunk`.
    #[error("object size {size} exceeds limit {limit}")]
    SizeExceeded { size: u64, limit: u64 },

    /// Write attempted against a key that already holds a value.
    #[error("key already exists: {0}")]
    KeyAlreadyExists(String),

    /// Read or delete of a key with no stored object record.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The stored data does not match its record: checksum mismatch, a
    /// missing chunk, or an undecodable value. Corruption, distinct from
    /// absence.
    #[error("integrity failure for '{key}': {reason}")]
    IntegrityError { key: String, reason: String },

    /// The compensating delete after a failed write also failed. The cache
    /// may hold orphaned parts for this key and needs operator attention.
    #[error("rollback failed for '{0}': cache may hold orphaned parts")]
    RollbackFailed(String),

    /// Opaque failure surfaced by the cache transport, passed through.
    #[error("backend error: {0}")]
    Backend(String),

    /// Construction-time configuration problem.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO failure while reading the source.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
