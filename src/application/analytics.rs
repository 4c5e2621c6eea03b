//! Cache-aside layer over the expensive reporting aggregates.
//!
//! The cache store is non-authoritative: it can be stale, unreachable or
//! entirely unconfigured without changing what callers observe, only how
//! long they wait.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::errors::{CacheError, DomainError};
use crate::domain::order::{SalesSummary, StatusCount};
use crate::domain::ports::{CacheStore, OrderRepository};

pub const ANALYTICS_KEY_PREFIX: &str = "analytics:orders:";
pub const ANALYTICS_KEY_PATTERN: &str = "analytics:orders:*";

const SUMMARY_TTL_SECS: u64 = 300;
const SCAN_PAGE_SIZE: usize = 100;
const DEL_BATCH_SIZE: usize = 50;

/// Cache-aside wrapper. `None` for the store means "unconfigured": every
/// read degrades to computing directly.
pub struct AnalyticsCache<S> {
    store: Option<S>,
}

impl<S: CacheStore> AnalyticsCache<S> {
    pub fn new(store: Option<S>) -> Self {
        Self { store }
    }

    /// Read through the cache: hit -> return; miss or store error -> run the
    /// fetcher, then write the value back best-effort. Cache failures are
    /// logged and swallowed, never propagated.
    pub fn get_or_compute<T, F>(&self, key: &str, ttl_secs: u64, fetcher: F) -> Result<T, DomainError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, DomainError>,
    {
        if let Some(store) = &self.store {
            match store.get(key) {
                Ok(Some(raw)) => match serde_json::from_str(&raw) {
                    Ok(value) => return Ok(value),
                    Err(e) => log::warn!("discarding undecodable cache entry {key}: {e}"),
                },
                Ok(None) => {}
                Err(e) => log::warn!("cache read for {key} failed: {e}"),
            }
        }

        let value = fetcher()?;

        if let Some(store) = &self.store {
            match serde_json::to_string(&value) {
                Ok(raw) => {
                    if let Err(e) = store.set(key, &raw, ttl_secs) {
                        log::warn!("cache write for {key} failed: {e}");
                    }
                }
                Err(e) => log::warn!("could not serialize cache value for {key}: {e}"),
            }
        }

        Ok(value)
    }
}

/// Best-effort pattern invalidation: page through the keyspace and delete
/// matches in batches. A failed delete batch is logged and skipped; whatever
/// survives expires by TTL. Returns the number of keys deleted.
pub fn invalidate_pattern<S: CacheStore>(store: &S, pattern: &str) -> Result<usize, CacheError> {
    let mut cursor = 0u64;
    let mut deleted = 0usize;
    loop {
        let (next, keys) = store.scan(cursor, pattern, SCAN_PAGE_SIZE)?;
        for chunk in keys.chunks(DEL_BATCH_SIZE) {
            match store.del(chunk) {
                Ok(()) => deleted += chunk.len(),
                Err(e) => log::warn!("failed to delete {} cache keys: {e}", chunk.len()),
            }
        }
        if next == 0 {
            return Ok(deleted);
        }
        cursor = next;
    }
}

/// Reporting facade: aggregates computed by the repository, cached under
/// `analytics:orders:` keys.
pub struct AnalyticsService<R, S> {
    repo: R,
    cache: AnalyticsCache<S>,
}

impl<R: OrderRepository, S: CacheStore> AnalyticsService<R, S> {
    pub fn new(repo: R, cache: AnalyticsCache<S>) -> Self {
        Self { repo, cache }
    }

    pub fn sales_summary(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<SalesSummary, DomainError> {
        let key = format!(
            "{ANALYTICS_KEY_PREFIX}summary:{}:{}",
            from.map_or(0, |d| d.timestamp()),
            to.map_or(0, |d| d.timestamp()),
        );
        self.cache
            .get_or_compute(&key, SUMMARY_TTL_SECS, || self.repo.sales_summary(from, to))
    }

    pub fn status_breakdown(&self) -> Result<Vec<StatusCount>, DomainError> {
        let key = format!("{ANALYTICS_KEY_PREFIX}status-breakdown");
        self.cache
            .get_or_compute(&key, SUMMARY_TTL_SECS, || self.repo.status_breakdown())
    }
}
