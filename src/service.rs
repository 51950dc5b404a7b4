//! The coordinator: single entry point for lookups and owner of the
//! cross-cutting lifecycle behavior.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::account::{AccountError, AccountKey};
use crate::automation::{AutomationError, AutomationRunner, ProbeOptions};
use crate::cache::AppCache;
use crate::hub::PageHub;
use crate::models::{CacheStats, ProfileResult, RegionResult};
use crate::queue::{QueryQueue, QueueError, QueueStatus};

#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Automation(#[from] AutomationError),

    #[error("cache storage failed: {0}")]
    Storage(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LookupOptions {
    pub keep_artifact: bool,
    pub priority: bool,
    /// Drop any cached entry first so the lookup re-runs automation.
    pub force_refresh: bool,
}

pub struct Coordinator {
    cache: AppCache,
    queue: QueryQueue,
    runner: AutomationRunner,
    hub: Arc<PageHub>,
}

impl Coordinator {
    pub fn new(
        cache: AppCache,
        queue: QueryQueue,
        runner: AutomationRunner,
        hub: Arc<PageHub>,
    ) -> Self {
        Self {
            cache,
            queue,
            runner,
            hub,
        }
    }

    /// Resolve the region for an account, from cache when possible and
    /// through the queued automation path otherwise.
    ///
    /// Rate-limited outcomes are returned but never cached; terminal
    /// inconclusive outcomes (undisclosed, self account) are cached so
    /// repeat lookups stop re-running automation.
    pub async fn lookup_region(
        &self,
        account: &str,
        options: LookupOptions,
    ) -> Result<RegionResult, QueryError> {
        let key = AccountKey::parse(account)?;

        if options.force_refresh {
            if let Err(err) = self.cache.region.remove(&key).await {
                warn!(key = %key, %err, "failed to drop cache entry before refresh");
            }
        } else {
            // A failed read is a miss. The queue's duplicate rejection, not
            // this check, is the authoritative guard against two concurrent
            // automations for the same key.
            match self.cache.region.get(&key).await {
                Ok(Some(entry)) => {
                    debug!(key = %key, "serving region from cache");
                    return Ok(entry.value);
                }
                Ok(None) => {}
                Err(err) => warn!(key = %key, %err, "region cache read failed"),
            }
        }

        let probe_options = ProbeOptions {
            keep_artifact: options.keep_artifact,
        };
        let outcome = self
            .queue
            .enqueue(
                key.clone(),
                options.priority,
                self.runner.run(&key, probe_options),
            )
            .await?;

        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                error!(key = %key, %err, "automation failed");
                return Err(err.into());
            }
        };

        if result.is_cacheable() {
            if let Err(err) = self.cache.region.put(&key, result.clone()).await {
                warn!(key = %key, %err, "failed to persist lookup result");
            }
        } else {
            debug!(key = %key, "transient outcome left uncached");
        }

        Ok(result)
    }

    /// Read-only cache probe; never triggers automation.
    pub async fn cached_region(&self, account: &str) -> Result<Option<RegionResult>, QueryError> {
        let key = AccountKey::parse(account)?;
        Ok(self.cache.region.get(&key).await?.map(|entry| entry.value))
    }

    /// Forces the next lookup for the account to bypass the cache.
    pub async fn remove_cached_region(&self, account: &str) -> Result<bool, QueryError> {
        let key = AccountKey::parse(account)?;
        Ok(self.cache.region.remove(&key).await?)
    }

    pub async fn clear_region_cache(&self) -> Result<u64, sqlx::Error> {
        self.cache.region.clear().await
    }

    pub async fn clear_profile_cache(&self) -> Result<u64, sqlx::Error> {
        self.cache.profile.clear().await
    }

    pub async fn cache_stats(&self) -> Result<(CacheStats, CacheStats), sqlx::Error> {
        let region = self.cache.region.stats().await?;
        let profile = self.cache.profile.stats().await?;
        Ok((region, profile))
    }

    pub fn region_ttl_days(&self) -> i64 {
        self.cache.region.ttl_days()
    }

    pub fn profile_ttl_days(&self) -> i64 {
        self.cache.profile.ttl_days()
    }

    pub async fn cached_profile(&self, account: &str) -> Result<Option<ProfileResult>, QueryError> {
        let key = AccountKey::parse(account)?;
        Ok(self.cache.profile.get(&key).await?.map(|entry| entry.value))
    }

    pub async fn put_profile(
        &self,
        account: &str,
        profile: ProfileResult,
    ) -> Result<(), QueryError> {
        let key = AccountKey::parse(account)?;
        Ok(self.cache.profile.put(&key, profile).await?)
    }

    pub fn queue_status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// Clamp and forward a new concurrency cap; returns the applied value.
    pub fn set_max_concurrent(&self, requested: usize) -> usize {
        self.queue.set_max_concurrent(requested)
    }

    /// The panel's lifecycle signal dropped: ask every open page to remove
    /// its injected labels. Best effort; unreachable pages are only counted.
    pub fn on_panel_disconnected(&self) {
        info!(pages = self.hub.connected_pages(), "panel disconnected, requesting label cleanup");
        let report = self.hub.broadcast_remove_labels();
        info!(
            notified = report.notified,
            failed = report.failed,
            "label cleanup broadcast finished"
        );
    }
}
