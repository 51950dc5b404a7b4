//! SQLite-backed cache with an in-memory hot layer.

use chrono::{DateTime, Duration as TimeDelta, Utc};
use moka::future::Cache as MokaCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::account::AccountKey;
use crate::db::cache_entry;
use crate::models::CacheStats;

/// A cached value together with the moment it was written. Freshness is
/// always re-derived from `stored_at`, never assumed from which layer the
/// entry came out of.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry<T> {
    pub value: T,
    pub stored_at: DateTime<Utc>,
}

/// One cache namespace over the shared `cache_entries` table.
///
/// Reads check the moka hot layer first and fall back to SQLite; both paths
/// apply the same lazy TTL check, so an expired row is reported absent while
/// still counting toward `stats().total_count` until it is overwritten or
/// removed.
pub struct PersistentCache<T> {
    pool: SqlitePool,
    namespace: &'static str,
    ttl_days: i64,
    hot: MokaCache<AccountKey, StoredEntry<T>>,
}

impl<T> PersistentCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(pool: SqlitePool, namespace: &'static str, ttl_days: i64, hot_capacity: u64) -> Self {
        // The hot layer's own TTL only bounds memory; staleness is decided
        // against stored_at on every read.
        let hot = MokaCache::builder()
            .max_capacity(hot_capacity)
            .time_to_live(std::time::Duration::from_secs(ttl_days as u64 * 86_400))
            .build();

        Self {
            pool,
            namespace,
            ttl_days,
            hot,
        }
    }

    pub fn ttl_days(&self) -> i64 {
        self.ttl_days
    }

    fn is_fresh(&self, stored_at: DateTime<Utc>) -> bool {
        Utc::now() - stored_at < TimeDelta::days(self.ttl_days)
    }

    /// Fetch a valid entry, or `None` for never-stored, expired and
    /// undecodable entries alike.
    pub async fn get(&self, key: &AccountKey) -> Result<Option<StoredEntry<T>>, sqlx::Error> {
        if let Some(entry) = self.hot.get(key).await {
            if self.is_fresh(entry.stored_at) {
                debug!(namespace = self.namespace, key = %key, "cache hit (hot)");
                return Ok(Some(entry));
            }
            self.hot.invalidate(key).await;
        }

        let Some(row) = cache_entry::get(&self.pool, self.namespace, key.as_str()).await? else {
            debug!(namespace = self.namespace, key = %key, "cache miss");
            return Ok(None);
        };

        let stored_at = DateTime::<Utc>::from_timestamp(row.stored_at, 0)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        if !self.is_fresh(stored_at) {
            debug!(namespace = self.namespace, key = %key, "cache entry expired");
            return Ok(None);
        }

        let value: T = match serde_json::from_str(&row.value) {
            Ok(value) => value,
            Err(err) => {
                warn!(namespace = self.namespace, key = %key, %err, "discarding undecodable cache entry");
                return Ok(None);
            }
        };

        let entry = StoredEntry { value, stored_at };
        self.hot.insert(key.clone(), entry.clone()).await;
        debug!(namespace = self.namespace, key = %key, "cache hit");
        Ok(Some(entry))
    }

    /// Overwrite any prior entry for the key and reset its clock.
    pub async fn put(&self, key: &AccountKey, value: T) -> Result<(), sqlx::Error> {
        self.put_at(key, value, Utc::now()).await
    }

    pub(crate) async fn put_at(
        &self,
        key: &AccountKey,
        value: T,
        stored_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let json = serde_json::to_string(&value).map_err(|err| sqlx::Error::Encode(err.into()))?;
        cache_entry::put(
            &self.pool,
            self.namespace,
            key.as_str(),
            &json,
            stored_at.timestamp(),
        )
        .await?;
        self.hot
            .insert(key.clone(), StoredEntry { value, stored_at })
            .await;
        debug!(namespace = self.namespace, key = %key, "cached result");
        Ok(())
    }

    /// Drop a single entry. Returns whether a row existed.
    pub async fn remove(&self, key: &AccountKey) -> Result<bool, sqlx::Error> {
        self.hot.invalidate(key).await;
        cache_entry::remove(&self.pool, self.namespace, key.as_str()).await
    }

    /// Drop every entry in this namespace. Safe to call repeatedly.
    pub async fn clear(&self) -> Result<u64, sqlx::Error> {
        self.hot.invalidate_all();
        let removed = cache_entry::clear(&self.pool, self.namespace).await?;
        debug!(namespace = self.namespace, removed, "cache cleared");
        Ok(removed)
    }

    /// Observability counters straight from storage; does not mutate rows.
    pub async fn stats(&self) -> Result<CacheStats, sqlx::Error> {
        let ttl_secs = self.ttl_days * 86_400;
        let (valid, total) =
            cache_entry::stats(&self.pool, self.namespace, ttl_secs, Utc::now().timestamp())
                .await?;
        Ok(CacheStats {
            valid_count: valid,
            total_count: total,
            expired_count: total - valid,
        })
    }
}
