//! Backend selection by name.
//!
//! Trivial dispatch in front of the backend implementations, so embedders
//! can pick a transport from configuration without naming concrete types.

use std::str::FromStr;

use crate::backend::CacheBackend;
use crate::config::LobConfig;
use crate::error::{LobError, Result};
use crate::memory::MemoryBackend;
use crate::redis::RedisBackend;
use crate::store::ObjectStore;

/// Known cache backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// In-process shared map; tests and embedding.
    Memory,
    /// Redis server over the synchronous client.
    Redis,
}

impl FromStr for BackendKind {
    type Err = LobError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "redis" => Ok(BackendKind::Redis),
            other => Err(LobError::Config(format!("unknown cache backend '{other}'"))),
        }
    }
}

/// Open an object store over the named backend.
pub fn open(
    kind: BackendKind,
    url: Option<&str>,
    config: LobConfig,
) -> Result<ObjectStore<Box<dyn CacheBackend>>> {
    let backend: Box<dyn CacheBackend> = match kind {
        BackendKind::Memory => Box::new(MemoryBackend::new()),
        BackendKind::Redis => {
            let url = url.ok_or_else(|| {
                LobError::Config("redis backend requires a connection url".to_string())
            })?;
            Box::new(RedisBackend::connect(url)?)
        }
    };
    ObjectStore::new(backend, config)
}

/// Open an object store using the backend named in the configuration.
pub fn open_with_config(config: LobConfig) -> Result<ObjectStore<Box<dyn CacheBackend>>> {
    let kind: BackendKind = config.backend.parse()?;
    let url = config.url.clone();
    open(kind, url.as_deref(), config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_known_names() {
        assert_eq!("memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert_eq!("Redis".parse::<BackendKind>().unwrap(), BackendKind::Redis);
    }

    #[test]
    fn test_kind_rejects_unknown_name() {
        let err = "memcached-ng".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, LobError::Config(_)));
        assert!(err.to_string().contains("memcached-ng"));
    }

    #[test]
    fn test_open_memory_roundtrips() {
        let store = open(BackendKind::Memory, None, LobConfig::default()).unwrap();
        assert!(store.set("obj", &b"through the factory"[..]).unwrap());
        assert_eq!(store.get("obj").unwrap().unwrap(), b"through the factory");
    }

    #[test]
    fn test_open_redis_requires_url() {
        let result = open(BackendKind::Redis, None, LobConfig::default());
        assert!(matches!(result, Err(LobError::Config(_))));
    }

    #[test]
    fn test_open_with_config_uses_backend_field() {
        let store = open_with_config(LobConfig::default()).unwrap();
        assert!(store.set("obj", &b"x"[..]).unwrap());
    }

    #[test]
    fn test_open_with_config_unknown_backend() {
        let config = LobConfig::new().with_backend("carrier-pigeon");
        assert!(matches!(open_with_config(config), Err(LobError::Config(_))));
    }
}
