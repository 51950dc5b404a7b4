//! Contract with the browser-side automation that actually opens a profile
//! tab, walks the menus and reads the "based in" field. The service never
//! sees those steps; it hands a key to a [`RegionProbe`] and gets back a
//! [`RegionResult`] or a classified fault.

pub mod runner;

use async_trait::async_trait;
use thiserror::Error;

use crate::account::AccountKey;
use crate::models::RegionResult;

pub use runner::{AutomationRunner, RunnerConfig};

#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeOptions {
    /// Leave the automation tab open after the lookup finishes. Debugging
    /// aid; the tab is normally disposed.
    pub keep_artifact: bool,
}

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("automation step timed out: {0}")]
    StepTimeout(&'static str),

    #[error("no automation client is connected")]
    NoClient,

    #[error("automation failed: {0}")]
    Internal(String),
}

impl AutomationError {
    /// Timing faults are worth another pass; everything else is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, AutomationError::StepTimeout(_))
    }
}

/// Drives one complete lookup attempt for an account.
///
/// Implementations resolve with a [`RegionResult`] for every automation pass
/// that completes, including rate-limited and self-account passes, and err
/// only for transport or internal faults.
#[async_trait]
pub trait RegionProbe: Send + Sync {
    async fn probe(
        &self,
        key: &AccountKey,
        options: ProbeOptions,
    ) -> Result<RegionResult, AutomationError>;
}
