//! The chunking protocol: write with rollback, verified reassembly, bulk
//! delete.
//!
//! An [`ObjectStore`] holds a [`CacheBackend`] and layers the large-object
//! protocol on top:
//!
//! - `set` splits the source into bounded chunks under derived part keys
//!   (`"{key}_{index}"`), stores them plus a metadata record in one batched
//!   write, and rolls the batch back if the backend rejects it.
//! - `get` fetches the record, then the chunks in strict index order,
//!   verifying the accumulated checksum before returning anything.
//! - `get_partial` yields chunks as they arrive, before the checksum is
//!   confirmed, and reports a mismatch only after the last chunk. That is a
//!   deliberate trade-off for large objects: lower memory and latency, at
//!   the cost of delayed failure detection.
//! - `delete` removes the record and every part in one batched delete.
//!
//! All operations are synchronous and assume a single writer per key: the
//! existence check in `set` and the fetch-then-delete in `delete` are
//! check-then-act, and concurrent callers racing on one key can interleave.

use std::io::Read;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::backend::CacheBackend;
use crate::checksum::ChecksumBuilder;
use crate::config::LobConfig;
use crate::error::{LobError, Result};
use crate::record::{self, ObjectRecord};

/// Reserved width for the part-key suffix: `"_"` plus the 20 decimal digits
/// of the largest `u64` index. Subtracting a fixed worst case keeps the
/// derived key plus payload under the backend ceiling no matter how many
/// parts an object ends up with.
pub(crate) const PART_SUFFIX_RESERVE: usize = 21;

/// Options accepted by write operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Reserved: entry expiry. Accepted and ignored; the backend capability
    /// set carries no TTL.
    pub expire: Option<Duration>,

    /// Reserved: skip waiting for backend acknowledgement.
    pub noreply: bool,
}

/// Stores byte objects larger than the backend's per-value ceiling by
/// splitting them into chunks.
///
/// The store is the sole writer and reader of the record and part keys it
/// derives; nothing else should touch them.
pub struct ObjectStore<B: CacheBackend> {
    backend: B,
    config: LobConfig,
}

impl<B: CacheBackend> ObjectStore<B> {
    /// Create a store over `backend` with a validated configuration.
    pub fn new(backend: B, config: LobConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &LobConfig {
        &self.config
    }

    /// Part key for `key` and zero-based chunk `index`: `"{key}_{index}"`.
    pub fn part_key(key: &str, index: u64) -> String {
        format!("{key}_{index}")
    }

    /// Largest payload a single chunk of `key` can carry: the backend
    /// ceiling minus the key, the reserved part-key suffix, and the value
    /// tag. Fails when the key itself leaves no room.
    pub fn effective_chunk_size(&self, key: &str) -> Result<usize> {
        let overhead = key.len() + PART_SUFFIX_RESERVE + record::VALUE_TAG_LEN;
        let max_chunk = self.config.max_chunk as usize;
        if overhead >= max_chunk {
            return Err(LobError::SizeExceeded {
                size: overhead as u64,
                limit: self.config.max_chunk,
            });
        }
        Ok(max_chunk - overhead)
    }

    /// Store an object read from `source` under `key`.
    ///
    /// Fails with `KeyAlreadyExists` when the key holds any value; there are
    /// no overwrite semantics (use [`replace`](Self::replace)). The source
    /// is read once; its size is policed against `max_file_size` as it
    /// streams, before anything is written to the backend.
    pub fn set<R: Read>(&self, key: &str, source: R) -> Result<bool> {
        self.set_with(key, source, SetOptions::default())
    }

    /// [`set`](Self::set) with explicit options.
    pub fn set_with<R: Read>(&self, key: &str, mut source: R, _opts: SetOptions) -> Result<bool> {
        match self.backend.get(key) {
            Ok(Some(_)) => {
                return self.fail_bool(LobError::KeyAlreadyExists(key.to_string()));
            }
            Ok(None) => {}
            Err(err) => return self.fail_bool(err),
        }

        let chunk_size = match self.effective_chunk_size(key) {
            Ok(size) => size,
            Err(err) => return self.fail_bool(err),
        };

        let mut entries: Vec<(String, Vec<u8>)> = Vec::new();
        let mut hasher = ChecksumBuilder::new();
        let mut buf = vec![0u8; chunk_size];
        let mut total: u64 = 0;
        let mut index: u64 = 0;

        loop {
            let n = read_full(&mut source, &mut buf)?;
            if n == 0 {
                break;
            }
            total += n as u64;
            if total > self.config.max_file_size {
                return self.fail_bool(LobError::SizeExceeded {
                    size: total,
                    limit: self.config.max_file_size,
                });
            }
            let slice = &buf[..n];
            hasher.update(slice);
            entries.push((Self::part_key(key, index), record::encode_chunk(slice)));
            index += 1;
        }

        if index > self.config.max_parts() {
            debug!(key, parts = index, ceiling = self.config.max_parts(), "part count above advisory ceiling");
        }

        let object = ObjectRecord {
            checksum: hasher.finish(),
            parts_num: index,
        };
        entries.push((key.to_string(), object.encode()?));

        debug!(key, parts = index, bytes = total, "storing chunked object");

        let staged: Vec<String> = entries.iter().map(|(k, _)| k.clone()).collect();
        match self.backend.set_many(entries) {
            Ok(true) => Ok(true),
            Ok(false) => {
                warn!(key, staged = staged.len(), "bulk write rejected, rolling back");
                if self.rollback(&staged) {
                    self.fail_bool(LobError::Backend(format!(
                        "bulk write of {} values for '{key}' failed",
                        staged.len()
                    )))
                } else {
                    self.fail_bool(LobError::RollbackFailed(key.to_string()))
                }
            }
            Err(err) => {
                warn!(key, staged = staged.len(), "bulk write errored, rolling back: {err}");
                if self.rollback(&staged) {
                    self.fail_bool(err)
                } else {
                    self.fail_bool(LobError::RollbackFailed(key.to_string()))
                }
            }
        }
    }

    /// Store an in-memory object under `key`.
    ///
    /// The length is known up front, so the size guard runs before the
    /// existence check.
    pub fn set_bytes(&self, key: &str, data: &[u8]) -> Result<bool> {
        if data.len() as u64 > self.config.max_file_size {
            return self.fail_bool(LobError::SizeExceeded {
                size: data.len() as u64,
                limit: self.config.max_file_size,
            });
        }
        self.set(key, data)
    }

    /// Store several objects; returns whether every one succeeded.
    ///
    /// No cross-object atomicity: one failure does not roll back the others.
    pub fn set_many<R: Read>(&self, objects: Vec<(String, R)>) -> Result<bool> {
        let mut all = true;
        for (key, source) in objects {
            all &= self.set(&key, source)?;
        }
        if !all {
            return self.fail_bool(LobError::Backend(
                "one or more objects failed to store".to_string(),
            ));
        }
        Ok(true)
    }

    /// Fetch and reassemble the object stored under `key`.
    ///
    /// Returns the full byte content only after the accumulated checksum has
    /// been verified against the stored record.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let object = match self.load_record(key) {
            Ok(Some(object)) => object,
            Ok(None) => return self.fail_opt(LobError::NotFound(key.to_string())),
            Err(err) => return self.fail_opt(err),
        };

        let mut hasher = ChecksumBuilder::new();
        let mut data = Vec::new();
        for index in 0..object.parts_num {
            match self.load_part(key, index) {
                Ok(part) => {
                    hasher.update(&part);
                    data.extend_from_slice(&part);
                }
                Err(err) => return self.fail_opt(err),
            }
        }

        let digest = hasher.finish();
        if digest != object.checksum {
            return self.fail_opt(LobError::IntegrityError {
                key: key.to_string(),
                reason: format!(
                    "checksum mismatch: expected {}, got {digest}",
                    object.checksum
                ),
            });
        }

        Ok(Some(data))
    }

    /// Fetch the object lazily, yielding each chunk payload as it arrives.
    ///
    /// The returned sequence is finite and not restartable. Chunks are
    /// handed to the caller before integrity has been confirmed; a checksum
    /// mismatch is yielded as one final `Err` after the last chunk. Callers
    /// that cannot tolerate unverified data should use [`get`](Self::get).
    pub fn get_partial(&self, key: &str) -> Result<Parts<'_, B>> {
        match self.load_record(key) {
            Ok(Some(object)) => Ok(Parts::new(self, key, object)),
            Ok(None) => {
                self.fail_opt::<()>(LobError::NotFound(key.to_string()))?;
                Ok(Parts::finished(self, key))
            }
            Err(err) => {
                self.fail_opt::<()>(err)?;
                Ok(Parts::finished(self, key))
            }
        }
    }

    /// Delete the object under `key` and every one of its parts.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let object = match self.load_record(key) {
            Ok(Some(object)) => object,
            Ok(None) => return self.fail_bool(LobError::NotFound(key.to_string())),
            Err(err) => return self.fail_bool(err),
        };

        let mut keys: Vec<String> = (0..object.parts_num)
            .map(|index| Self::part_key(key, index))
            .collect();
        keys.push(key.to_string());

        debug!(key, parts = object.parts_num, "deleting object and parts");
        match self.backend.delete_many(&keys) {
            Ok(true) => Ok(true),
            Ok(false) => self.fail_bool(LobError::Backend(format!(
                "bulk delete of {} keys for '{key}' failed",
                keys.len()
            ))),
            Err(err) => self.fail_bool(err),
        }
    }

    /// Delete several objects; returns whether every one succeeded.
    pub fn delete_many<K: AsRef<str>>(&self, keys: &[K]) -> Result<bool> {
        let mut all = true;
        for key in keys {
            all &= self.delete(key.as_ref())?;
        }
        if !all {
            return self.fail_bool(LobError::Backend(
                "one or more objects failed to delete".to_string(),
            ));
        }
        Ok(true)
    }

    /// Replace the object under `key`: delete, then set.
    ///
    /// Not atomic. A set failure after a successful delete leaves the key
    /// absent rather than holding the old object.
    pub fn replace<R: Read>(&self, key: &str, source: R) -> Result<bool> {
        self.delete(key)?;
        self.set(key, source)
    }

    fn load_record(&self, key: &str) -> Result<Option<ObjectRecord>> {
        let value = match self.backend.get(key)? {
            Some(value) => value,
            None => return Ok(None),
        };
        ObjectRecord::decode(&value)
            .map(Some)
            .map_err(|err| LobError::IntegrityError {
                key: key.to_string(),
                reason: format!("undecodable object record: {err}"),
            })
    }

    fn load_part(&self, key: &str, index: u64) -> Result<Vec<u8>> {
        let part_key = Self::part_key(key, index);
        let value = self
            .backend
            .get(&part_key)?
            .ok_or_else(|| LobError::IntegrityError {
                key: key.to_string(),
                reason: format!("chunk {index} missing from backend"),
            })?;
        let payload = record::decode_chunk(&value).map_err(|err| LobError::IntegrityError {
            key: key.to_string(),
            reason: format!("chunk {index}: {err}"),
        })?;
        Ok(payload.to_vec())
    }

    /// Best-effort compensating delete of a half-written batch.
    fn rollback(&self, staged: &[String]) -> bool {
        match self.backend.delete_many(staged) {
            Ok(ok) => ok,
            Err(err) => {
                error!("rollback delete failed: {err}");
                false
            }
        }
    }

    fn fail_bool(&self, err: LobError) -> Result<bool> {
        if self.config.raise_on_error {
            Err(err)
        } else {
            error!("{err}");
            Ok(false)
        }
    }

    fn fail_opt<T>(&self, err: LobError) -> Result<Option<T>> {
        if self.config.raise_on_error {
            Err(err)
        } else {
            error!("{err}");
            Ok(None)
        }
    }
}

/// Lazy chunk sequence produced by [`ObjectStore::get_partial`].
///
/// Yields each chunk payload as it is fetched, then one final
/// `Err(IntegrityError)` if the accumulated checksum does not match the
/// stored record. Finite and not restartable; any mid-stream failure ends
/// the sequence.
pub struct Parts<'a, B: CacheBackend> {
    store: &'a ObjectStore<B>,
    key: String,
    object: ObjectRecord,
    hasher: ChecksumBuilder,
    index: u64,
    done: bool,
}

impl<'a, B: CacheBackend> Parts<'a, B> {
    fn new(store: &'a ObjectStore<B>, key: &str, object: ObjectRecord) -> Self {
        Self {
            store,
            key: key.to_string(),
            object,
            hasher: ChecksumBuilder::new(),
            index: 0,
            done: false,
        }
    }

    /// An already-exhausted sequence, for lenient-mode absence.
    fn finished(store: &'a ObjectStore<B>, key: &str) -> Self {
        Self {
            done: true,
            ..Self::new(
                store,
                key,
                ObjectRecord {
                    checksum: ChecksumBuilder::new().finish(),
                    parts_num: 0,
                },
            )
        }
    }
}

impl<B: CacheBackend> Iterator for Parts<'_, B> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.index < self.object.parts_num {
            return match self.store.load_part(&self.key, self.index) {
                Ok(part) => {
                    self.hasher.update(&part);
                    self.index += 1;
                    Some(Ok(part))
                }
                Err(err) => {
                    self.done = true;
                    Some(Err(err))
                }
            };
        }

        self.done = true;
        let digest = self.hasher.finish();
        if digest == self.object.checksum {
            None
        } else {
            let err = LobError::IntegrityError {
                key: self.key.clone(),
                reason: format!(
                    "checksum mismatch: expected {}, got {digest}",
                    self.object.checksum
                ),
            };
            // An iterator has no falsy channel mid-stream, so the verdict is
            // always yielded; lenient mode also logs it.
            if !self.store.config.raise_on_error {
                error!("{err}");
            }
            Some(Err(err))
        }
    }
}

/// Read until `buf` is full or the source is exhausted.
fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
