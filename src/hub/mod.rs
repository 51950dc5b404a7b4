//! Registry of connected browser pages.
//!
//! Content pages hold a WebSocket session with the service. The hub pushes
//! commands to them (label cleanup, region probes) and routes their reports
//! back to whoever is waiting. Probe dispatch is correlated by id through a
//! oneshot map and bounded by a deadline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::account::AccountKey;
use crate::automation::{AutomationError, ProbeOptions, RegionProbe};
use crate::models::RegionResult;

/// Commands pushed to connected pages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RemoveLabels,
    QueryRegion {
        id: u64,
        account: AccountKey,
        keep_tab: bool,
    },
}

/// Reports received from pages.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageMessage {
    RegionReport {
        id: u64,
        #[serde(default)]
        result: Option<RegionResult>,
        #[serde(default)]
        error: Option<String>,
    },
    LabelsRemoved {
        removed: u32,
    },
}

/// Outcome of a best-effort broadcast. Unreachable pages are counted, never
/// escalated.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastReport {
    pub notified: usize,
    pub failed: usize,
}

#[derive(Default)]
struct HubInner {
    pages: HashMap<u64, mpsc::UnboundedSender<ServerMessage>>,
    pending: HashMap<u64, oneshot::Sender<Result<RegionResult, AutomationError>>>,
}

pub struct PageHub {
    inner: Mutex<HubInner>,
    next_page_id: AtomicU64,
    next_probe_id: AtomicU64,
}

impl PageHub {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HubInner::default()),
            next_page_id: AtomicU64::new(1),
            next_probe_id: AtomicU64::new(1),
        }
    }

    pub fn register_page(&self, sender: mpsc::UnboundedSender<ServerMessage>) -> u64 {
        let id = self.next_page_id.fetch_add(1, Ordering::Relaxed);
        self.lock().pages.insert(id, sender);
        info!(page = id, "page session connected");
        id
    }

    pub fn unregister_page(&self, id: u64) {
        self.lock().pages.remove(&id);
        info!(page = id, "page session disconnected");
    }

    pub fn connected_pages(&self) -> usize {
        self.lock().pages.len()
    }

    /// Ask every connected page to strip its injected labels.
    pub fn broadcast_remove_labels(&self) -> BroadcastReport {
        let mut inner = self.lock();
        let mut report = BroadcastReport {
            notified: 0,
            failed: 0,
        };
        inner.pages.retain(|page, sender| {
            if sender.send(ServerMessage::RemoveLabels).is_ok() {
                report.notified += 1;
                true
            } else {
                debug!(page, "page unreachable during label cleanup");
                report.failed += 1;
                false
            }
        });
        report
    }

    /// Route a raw page report. Malformed payloads and reports for probes
    /// that already timed out are dropped.
    pub fn handle_page_message(&self, raw: &str) {
        let message: PageMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(err) => {
                warn!(%err, "discarding malformed page message");
                return;
            }
        };

        match message {
            PageMessage::RegionReport { id, result, error } => {
                let Some(reply) = self.lock().pending.remove(&id) else {
                    debug!(probe = id, "report for unknown or timed-out probe");
                    return;
                };
                let outcome = match result {
                    Some(result) => Ok(result),
                    None => Err(AutomationError::Internal(
                        error.unwrap_or_else(|| "page reported no result".to_string()),
                    )),
                };
                let _ = reply.send(outcome);
            }
            PageMessage::LabelsRemoved { removed } => {
                debug!(removed, "page finished label cleanup");
            }
        }
    }

    /// Send a probe command to a connected page and wait for its report.
    pub async fn dispatch_probe(
        &self,
        account: AccountKey,
        keep_tab: bool,
        deadline: Duration,
    ) -> Result<RegionResult, AutomationError> {
        let id = self.next_probe_id.fetch_add(1, Ordering::Relaxed);
        let (reply, response) = oneshot::channel();

        {
            let mut inner = self.lock();
            // Any connected page can host the automation tab.
            let Some((page, sender)) = inner
                .pages
                .iter()
                .next()
                .map(|(page, sender)| (*page, sender.clone()))
            else {
                return Err(AutomationError::NoClient);
            };

            inner.pending.insert(id, reply);
            let command = ServerMessage::QueryRegion {
                id,
                account: account.clone(),
                keep_tab,
            };
            if sender.send(command).is_err() {
                inner.pending.remove(&id);
                inner.pages.remove(&page);
                return Err(AutomationError::NoClient);
            }
            debug!(probe = id, page, account = %account, "dispatched region probe");
        }

        match timeout(deadline, response).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(AutomationError::Internal(
                "probe reply channel closed".to_string(),
            )),
            Err(_) => {
                self.lock().pending.remove(&id);
                Err(AutomationError::StepTimeout("region probe"))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for PageHub {
    fn default() -> Self {
        Self::new()
    }
}

/// [`RegionProbe`] that delegates lookups to whichever browser page is
/// connected to the hub.
pub struct HubProbe {
    hub: Arc<PageHub>,
    deadline: Duration,
}

impl HubProbe {
    pub fn new(hub: Arc<PageHub>, deadline: Duration) -> Self {
        Self { hub, deadline }
    }
}

#[async_trait]
impl RegionProbe for HubProbe {
    async fn probe(
        &self,
        key: &AccountKey,
        options: ProbeOptions,
    ) -> Result<RegionResult, AutomationError> {
        self.hub
            .dispatch_probe(key.clone(), options.keep_artifact, self.deadline)
            .await
    }
}
