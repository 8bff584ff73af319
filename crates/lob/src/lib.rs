//! Large object storage over size-limited key-value caches.
//!
//! Cache backends cap the size of a single value. This crate stores byte
//! objects past that cap by splitting them into bounded chunks client-side:
//! each chunk lands under its own derived key, and a small metadata record
//! (checksum + part count) under the object's own key ties them together.
//! Reads fetch the record, reassemble the chunks in order, and verify the
//! checksum before handing anything back.
//!
//! # Quick Start
//!
//! ```rust
//! use lob::{LobConfig, MemoryBackend, ObjectStore};
//!
//! let store = ObjectStore::new(MemoryBackend::new(), LobConfig::default()).unwrap();
//!
//! store.set("report", &b"bytes too big for one cache value"[..]).unwrap();
//!
//! let data = store.get("report").unwrap().expect("stored");
//! assert_eq!(data, b"bytes too big for one cache value");
//!
//! store.delete("report").unwrap();
//! ```
//!
//! Or pick the backend by name:
//!
//! ```rust,no_run
//! use lob::{factory, LobConfig};
//!
//! let config = LobConfig::load().unwrap().with_backend("redis")
//!     .with_url("redis://127.0.0.1:6379");
//! let store = factory::open_with_config(config).unwrap();
//! ```
//!
//! # Key layout
//!
//! An object stored under `"doc"` in three chunks occupies four cache keys:
//!
//! ```text
//! doc      ->  [0x02] {"checksum": "...", "parts_num": 3}
//! doc_0    ->  [0x01] first chunk bytes
//! doc_1    ->  [0x01] second chunk bytes
//! doc_2    ->  [0x01] third chunk bytes
//! ```
//!
//! Record and chunks are created together, read together, and deleted
//! together; there is no update-in-place.
//!
//! # Caveats
//!
//! - Writes are atomic-ish, not atomic: a rejected batch is rolled back
//!   best-effort, and `RollbackFailed` reports when even that failed.
//! - One writer per key: the duplicate-key guard is check-then-act and
//!   concurrent writers to the same key can interleave.
//! - `get_partial` hands out chunk data before the checksum is confirmed
//!   and reports a mismatch only after the final chunk.

pub mod backend;
pub mod checksum;
pub mod config;
pub mod error;
pub mod factory;
pub mod memory;
pub mod record;
pub mod redis;
pub mod store;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use checksum::{Checksum, ChecksumBuilder, ChecksumError};
pub use config::LobConfig;
pub use error::{LobError, Result};
pub use factory::BackendKind;
pub use memory::MemoryBackend;
pub use record::{CodecError, ObjectRecord, ValueKind};
pub use store::{ObjectStore, Parts, SetOptions};

pub use crate::redis::RedisBackend;
