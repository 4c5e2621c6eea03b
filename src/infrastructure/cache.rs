use std::time::Duration;

use redis::Commands;

use crate::domain::errors::CacheError;
use crate::domain::ports::CacheStore;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Redis-backed cache store.
///
/// A fresh connection is taken per call with a short timeout; every failure
/// surfaces as a `CacheError` and is left to the caller's degradation
/// policy, never retried here.
#[derive(Clone)]
pub struct RedisCacheStore {
    client: redis::Client,
}

impl RedisCacheStore {
    pub fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError(e.to_string()))?;
        Ok(Self { client })
    }

    fn conn(&self) -> Result<redis::Connection, CacheError> {
        self.client
            .get_connection_with_timeout(CONNECT_TIMEOUT)
            .map_err(|e| CacheError(e.to_string()))
    }
}

impl CacheStore for RedisCacheStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn()?;
        conn.get(key).map_err(|e| CacheError(e.to_string()))
    }

    fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let mut conn = self.conn()?;
        conn.set_ex(key, value, ttl_secs)
            .map_err(|e| CacheError(e.to_string()))
    }

    fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        let mut conn = self.conn()?;
        redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query(&mut conn)
            .map_err(|e| CacheError(e.to_string()))
    }

    fn del(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        conn.del(keys).map_err(|e| CacheError(e.to_string()))
    }
}
