//! Construction-time configuration for the object store.
//!
//! Environment variables:
//! - `LOB_MAX_FILE_SIZE`: largest object accepted, in bytes
//! - `LOB_MAX_CHUNK`: largest single cache value the backend accepts, in bytes
//! - `LOB_RAISE_ON_ERROR`: set to "true" or "1" to surface failures as errors
//! - `LOB_BACKEND`: backend name for the factory ("memory" or "redis")
//! - `LOB_URL`: backend connection URL
//!
//! File-based loading reads a `[lob]` section from a TOML file:
//! ```toml
//! [lob]
//! max_file_size = 52428800
//! max_chunk = 1048576
//! raise_on_error = false
//! backend = "redis"
//! url = "redis://127.0.0.1:6379"
//! ```
//!
//! Default user path: `{config_dir}/lob/config.toml`.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{LobError, Result};
use crate::record::VALUE_TAG_LEN;
use crate::store::PART_SUFFIX_RESERVE;

/// Default largest accepted object: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Default backend per-value ceiling: 1 MiB.
pub const DEFAULT_MAX_CHUNK: u64 = 1024 * 1024;

/// Configuration for an [`ObjectStore`](crate::store::ObjectStore).
///
/// Fixed at construction; there is no runtime reconfiguration surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobConfig {
    /// Largest object accepted by a write, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Largest single value the cache backend accepts, in bytes. Chunk
    /// payloads are sized so key + tag + payload stay under this.
    #[serde(default = "default_max_chunk")]
    pub max_chunk: u64,

    /// Surface failures as errors (true) or log them and return a falsy
    /// result (false). Changes surfacing only, never detection.
    #[serde(default)]
    pub raise_on_error: bool,

    /// Backend name for [`factory::open_with_config`](crate::factory::open_with_config).
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Backend connection URL, where the backend needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_max_chunk() -> u64 {
    DEFAULT_MAX_CHUNK
}

fn default_backend() -> String {
    "memory".to_string()
}

impl Default for LobConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_chunk: DEFAULT_MAX_CHUNK,
            raise_on_error: false,
            backend: default_backend(),
            url: None,
        }
    }
}

impl LobConfig {
    /// Create a configuration with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the largest accepted object size in bytes.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Set the backend per-value ceiling in bytes.
    pub fn with_max_chunk(mut self, bytes: u64) -> Self {
        self.max_chunk = bytes;
        self
    }

    /// Choose between raising errors and log-and-return-falsy.
    pub fn with_raise_on_error(mut self, raise: bool) -> Self {
        self.raise_on_error = raise;
        self
    }

    /// Set the backend name used by the factory.
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    /// Set the backend connection URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = env::var("LOB_MAX_FILE_SIZE") {
            config.max_file_size = parse_bytes(&value, "LOB_MAX_FILE_SIZE")?;
        }
        if let Ok(value) = env::var("LOB_MAX_CHUNK") {
            config.max_chunk = parse_bytes(&value, "LOB_MAX_CHUNK")?;
        }
        if let Ok(value) = env::var("LOB_RAISE_ON_ERROR") {
            config.raise_on_error = value == "1" || value.eq_ignore_ascii_case("true");
        }
        if let Ok(value) = env::var("LOB_BACKEND") {
            config.backend = value;
        }
        if let Ok(value) = env::var("LOB_URL") {
            config.url = Some(value);
        }

        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to environment.
    ///
    /// The file should contain a `[lob]` section; a file without one falls
    /// through to [`from_env`](Self::from_env).
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|err| {
            LobError::Config(format!("failed to read config file {}: {err}", path.display()))
        })?;

        let table: toml::Table = contents.parse().map_err(|err| {
            LobError::Config(format!("failed to parse TOML {}: {err}", path.display()))
        })?;

        match table.get("lob") {
            Some(section) => section
                .clone()
                .try_into()
                .map_err(|err| LobError::Config(format!("failed to parse [lob] section: {err}"))),
            None => Self::from_env(),
        }
    }

    /// Default user config file path, when a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("lob").join("config.toml"))
    }

    /// Load from the default user config file when present, else environment.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Self::from_env(),
        }
    }

    /// Reject configurations no store could operate under.
    pub fn validate(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(LobError::Config("max_file_size must be nonzero".to_string()));
        }
        if self.max_chunk == 0 {
            return Err(LobError::Config("max_chunk must be nonzero".to_string()));
        }
        if self.max_chunk <= fixed_overhead() {
            return Err(LobError::Config(format!(
                "max_chunk {} leaves no room for chunk payload",
                self.max_chunk
            )));
        }
        Ok(())
    }

    /// Advisory ceiling on how many parts an accepted object can split into.
    ///
    /// Derived from the limits, never enforced: the true part count depends
    /// on each key's length.
    pub fn max_parts(&self) -> u64 {
        let min_chunk = self.max_chunk.saturating_sub(fixed_overhead()).max(1);
        self.max_file_size.div_ceil(min_chunk)
    }
}

/// Key-independent overhead of a stored chunk: value tag plus the reserved
/// part-key suffix width.
fn fixed_overhead() -> u64 {
    (PART_SUFFIX_RESERVE + VALUE_TAG_LEN) as u64
}

fn parse_bytes(value: &str, name: &str) -> Result<u64> {
    value.parse().map_err(|_| {
        LobError::Config(format!("{name} must be an integer byte count, got '{value}'"))
    })
}
