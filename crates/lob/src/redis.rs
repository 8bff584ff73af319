//! Redis-backed cache transport.
//!
//! Uses the synchronous connection API: the chunking protocol blocks the
//! caller for the duration of every cache round-trip, so there is nothing to
//! gain from an async client here. The batched multi-set maps to MSET and
//! the batched delete to a multi-key DEL, both single round-trips.

use redis::Client;

use crate::backend::CacheBackend;
use crate::error::{LobError, Result};

/// Cache backend speaking to a Redis server.
pub struct RedisBackend {
    client: Client,
}

impl RedisBackend {
    /// Connect to the given URL (e.g. `redis://127.0.0.1:6379`) and verify
    /// the server responds to PING.
    pub fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|err| LobError::Config(format!("invalid redis url '{url}': {err}")))?;

        let mut conn = client
            .get_connection()
            .map_err(|err| LobError::Config(format!("failed to connect to redis: {err}")))?;

        let _: String = redis::cmd("PING")
            .query(&mut conn)
            .map_err(|err| LobError::Config(format!("redis ping failed: {err}")))?;

        Ok(Self { client })
    }

    fn conn(&self) -> Result<redis::Connection> {
        self.client
            .get_connection()
            .map_err(|err| LobError::Backend(format!("redis connection error: {err}")))
    }
}

impl CacheBackend for RedisBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn()?;
        redis::cmd("GET")
            .arg(key)
            .query(&mut conn)
            .map_err(|err| LobError::Backend(format!("GET {key} failed: {err}")))
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        let mut conn = self.conn()?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query(&mut conn)
            .map_err(|err| LobError::Backend(format!("SET {key} failed: {err}")))?;
        Ok(true)
    }

    fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> Result<bool> {
        if entries.is_empty() {
            return Ok(true);
        }
        let mut conn = self.conn()?;
        let mut cmd = redis::cmd("MSET");
        for (key, value) in &entries {
            cmd.arg(key).arg(value);
        }
        let _: () = cmd
            .query(&mut conn)
            .map_err(|err| LobError::Backend(format!("MSET of {} keys failed: {err}", entries.len())))?;
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query(&mut conn)
            .map_err(|err| LobError::Backend(format!("DEL {key} failed: {err}")))?;
        Ok(removed > 0)
    }

    fn delete_many(&self, keys: &[String]) -> Result<bool> {
        if keys.is_empty() {
            return Ok(true);
        }
        let mut conn = self.conn()?;
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key);
        }
        let _removed: i64 = cmd
            .query(&mut conn)
            .map_err(|err| LobError::Backend(format!("DEL of {} keys failed: {err}", keys.len())))?;
        Ok(true)
    }
}
