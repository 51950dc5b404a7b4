//! Bounded-concurrency lookup scheduler.
//!
//! Each lookup is keyed by account. The queue guarantees at most one task per
//! key is pending or running at any time, caps the number of concurrently
//! running tasks, and bounds the pending backlog. Priority tasks jump ahead
//! of normal ones but never preempt a task that already started.
//!
//! Scheduling is a greedy loop: whenever a slot frees or a task is accepted,
//! pending tasks are started front-to-back until the cap is reached. Within
//! each priority class order is FIFO; sustained priority traffic can starve
//! normal tasks, which is acceptable for interactive-trigger usage.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

use crate::account::AccountKey;

/// Supported range for the concurrency cap. Out-of-range requests are
/// clamped, not rejected.
pub const MIN_CONCURRENT: usize = 1;
pub const MAX_CONCURRENT: usize = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("a lookup for {0} is already queued")]
    AlreadyQueued(AccountKey),

    #[error("a lookup for {0} is already running")]
    AlreadyRunning(AccountKey),

    #[error("the lookup queue is full ({capacity} pending)")]
    Full { capacity: usize },

    #[error("the queue was torn down before the task started")]
    Shutdown,
}

/// Snapshot of queue state for observability endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub running_count: usize,
    pub pending_count: usize,
    pub max_concurrent: usize,
    pub running_keys: Vec<AccountKey>,
    pub pending_keys: Vec<AccountKey>,
}

struct PendingTask {
    key: AccountKey,
    priority: bool,
    enqueued_at: Instant,
    grant: oneshot::Sender<SlotGuard>,
}

struct QueueInner {
    running: HashSet<AccountKey>,
    pending: VecDeque<PendingTask>,
    max_concurrent: usize,
    capacity: usize,
}

#[derive(Clone)]
pub struct QueryQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl QueryQueue {
    /// `max_concurrent` is clamped to the supported range; `capacity` bounds
    /// the pending backlog.
    pub fn new(max_concurrent: usize, capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner {
                running: HashSet::new(),
                pending: VecDeque::new(),
                max_concurrent: max_concurrent.clamp(MIN_CONCURRENT, MAX_CONCURRENT),
                capacity,
            })),
        }
    }

    /// Schedule `executor` for `key` and return its output.
    ///
    /// Rejects immediately, without touching the executor, when the key is
    /// already pending or running or when the backlog is at capacity. Once
    /// accepted the executor runs exactly once; its key occupies a running
    /// slot for the executor's whole lifetime and the slot is released on
    /// every exit path: resolve, error, panic, or the caller dropping the
    /// returned future.
    pub async fn enqueue<T, F>(
        &self,
        key: AccountKey,
        priority: bool,
        executor: F,
    ) -> Result<T, QueueError>
    where
        F: Future<Output = T>,
    {
        let granted = {
            let mut queue = lock(&self.inner);

            if queue.running.contains(&key) {
                debug!(key = %key, "rejected duplicate lookup (running)");
                return Err(QueueError::AlreadyRunning(key));
            }
            if queue.pending.iter().any(|task| task.key == key) {
                debug!(key = %key, "rejected duplicate lookup (queued)");
                return Err(QueueError::AlreadyQueued(key));
            }

            if queue.running.len() < queue.max_concurrent {
                queue.running.insert(key.clone());
                None
            } else {
                if queue.pending.len() >= queue.capacity {
                    debug!(key = %key, capacity = queue.capacity, "rejected lookup, queue full");
                    return Err(QueueError::Full {
                        capacity: queue.capacity,
                    });
                }
                let (grant, granted) = oneshot::channel();
                let task = PendingTask {
                    key: key.clone(),
                    priority,
                    enqueued_at: Instant::now(),
                    grant,
                };
                // Priority tasks line up behind other priority tasks but
                // ahead of every normal one; FIFO within each class.
                let slot = if priority {
                    queue
                        .pending
                        .iter()
                        .position(|task| !task.priority)
                        .unwrap_or(queue.pending.len())
                } else {
                    queue.pending.len()
                };
                queue.pending.insert(slot, task);
                Some(granted)
            }
        };

        // The slot guard travels through the grant channel so that a waiter
        // dropped at any point, even right after being granted, still frees
        // its slot.
        let _slot = match granted {
            Some(granted) => match granted.await {
                Ok(guard) => guard,
                Err(_) => return Err(QueueError::Shutdown),
            },
            None => SlotGuard::new(key, Arc::clone(&self.inner)),
        };

        Ok(executor.await)
    }

    /// Clamp and apply a new concurrency cap. Takes effect on the next
    /// scheduling decision; running tasks are never cancelled by lowering it.
    pub fn set_max_concurrent(&self, requested: usize) -> usize {
        let clamped = requested.clamp(MIN_CONCURRENT, MAX_CONCURRENT);
        let mut queue = lock(&self.inner);
        if clamped != queue.max_concurrent {
            debug!(from = queue.max_concurrent, to = clamped, "concurrency cap changed");
        }
        queue.max_concurrent = clamped;
        schedule(&self.inner, &mut queue);
        clamped
    }

    pub fn status(&self) -> QueueStatus {
        let queue = lock(&self.inner);
        QueueStatus {
            running_count: queue.running.len(),
            pending_count: queue.pending.len(),
            max_concurrent: queue.max_concurrent,
            running_keys: queue.running.iter().cloned().collect(),
            pending_keys: queue.pending.iter().map(|task| task.key.clone()).collect(),
        }
    }
}

/// Occupies one running slot. Releasing the slot in `Drop` covers every way
/// an executor can terminate, including never being polled at all.
struct SlotGuard {
    key: AccountKey,
    inner: Arc<Mutex<QueueInner>>,
    armed: bool,
}

impl SlotGuard {
    fn new(key: AccountKey, inner: Arc<Mutex<QueueInner>>) -> Self {
        Self {
            key,
            inner,
            armed: true,
        }
    }

    /// Neutralize the guard; used when the scheduler must roll back a grant
    /// while already holding the queue lock.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut queue = lock(&self.inner);
        queue.running.remove(&self.key);
        schedule(&self.inner, &mut queue);
    }
}

fn schedule(inner: &Arc<Mutex<QueueInner>>, queue: &mut QueueInner) {
    while queue.running.len() < queue.max_concurrent {
        let Some(task) = queue.pending.pop_front() else {
            break;
        };
        queue.running.insert(task.key.clone());
        let guard = SlotGuard::new(task.key.clone(), Arc::clone(inner));
        match task.grant.send(guard) {
            Ok(()) => {
                debug!(
                    key = %task.key,
                    waited_ms = task.enqueued_at.elapsed().as_millis() as u64,
                    priority = task.priority,
                    "started queued lookup"
                );
            }
            Err(guard) => {
                // The waiter went away before its turn. Roll the grant back
                // by hand; the disarmed guard must not re-lock the queue.
                guard.disarm();
                queue.running.remove(&task.key);
            }
        }
    }
}

// A panicking executor unwinds without holding the lock, but a poisoned
// mutex must still never wedge the scheduler.
fn lock(inner: &Mutex<QueueInner>) -> MutexGuard<'_, QueueInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
