use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::account::AccountKey;
use crate::automation::{AutomationError, ProbeOptions, RegionProbe};
use crate::models::RegionResult;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Extra attempts after a transient fault, on top of the first one.
    pub retry_attempts: usize,
    pub retry_min_delay: Duration,
    /// Randomized wait before each launch so automated visits don't land in
    /// a mechanical rhythm.
    pub pacing_min: Duration,
    pub pacing_max: Duration,
    /// Global cap on automation launches per minute, across all workers.
    pub launches_per_minute: Option<u32>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 2,
            retry_min_delay: Duration::from_millis(500),
            pacing_min: Duration::from_millis(2000),
            pacing_max: Duration::from_millis(4000),
            launches_per_minute: None,
        }
    }
}

/// Wraps a [`RegionProbe`] with launch pacing, an optional global rate limit
/// and bounded retries for transient faults. Resolved sentinels such as a
/// rate-limited pass are outcomes, not faults, and are returned as-is.
pub struct AutomationRunner {
    probe: Arc<dyn RegionProbe>,
    limiter: Option<DefaultDirectRateLimiter>,
    config: RunnerConfig,
}

impl AutomationRunner {
    pub fn new(probe: Arc<dyn RegionProbe>, config: RunnerConfig) -> Self {
        let limiter = config
            .launches_per_minute
            .and_then(NonZeroU32::new)
            .map(|per_minute| RateLimiter::direct(Quota::per_minute(per_minute)));

        Self {
            probe,
            limiter,
            config,
        }
    }

    pub async fn run(
        &self,
        key: &AccountKey,
        options: ProbeOptions,
    ) -> Result<RegionResult, AutomationError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        self.pace().await;

        let attempt = || async { self.probe.probe(key, options).await };
        attempt
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(self.config.retry_min_delay)
                    .with_max_times(self.config.retry_attempts)
                    .with_jitter(),
            )
            .when(AutomationError::is_transient)
            .notify(|err: &AutomationError, after: Duration| {
                warn!(%err, retry_in_ms = after.as_millis() as u64, "automation step failed, retrying");
            })
            .await
    }

    async fn pace(&self) {
        let window = self.config.pacing_max.saturating_sub(self.config.pacing_min);
        let delay = if window.is_zero() {
            self.config.pacing_min
        } else {
            self.config.pacing_min + window.mul_f64(rand::thread_rng().gen::<f64>())
        };
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "pacing before launch");
            sleep(delay).await;
        }
    }
}
