//! Priority request queue.
//!
//! Accepts asynchronous operations tagged with a priority and a dedupe key
//! and releases them for execution under a concurrency ceiling, strictly by
//! priority and first-in-first-out within a priority. An enqueue whose key
//! matches an entry that has not started yet attaches as an additional waiter
//! on that entry instead of queuing a second copy of the work.
//!
//! There is no cancellation of started work: clearing the queue detaches
//! waiters of not-yet-started entries (they receive
//! [`OrchestratorError::QueueCleared`]); operations already executing run to
//! completion.

mod priority;

pub use priority::{Priority, QueueStats};

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt};
use strum::IntoEnumIterator;
use tokio::sync::oneshot;

use crate::error_handling::OrchestratorError;
use crate::OpResult;

/// Release rank: priority first (reversed so `High` sorts lowest and pops
/// first), submission sequence second. `BTreeMap` iteration order over this
/// rank is exactly release order, and ties can never reorder because the
/// sequence is unique.
type Rank = (Reverse<Priority>, u64);

struct PendingEntry {
    key: String,
    priority: Priority,
    operation: BoxFuture<'static, OpResult>,
    waiters: Vec<oneshot::Sender<OpResult>>,
}

struct QueueState {
    pending: BTreeMap<Rank, PendingEntry>,
    by_key: HashMap<String, Rank>,
    active: usize,
    next_seq: u64,
}

struct QueueInner {
    state: Mutex<QueueState>,
    max_concurrent: usize,
}

/// Concurrency-limited, strictly ordered release of queued operations.
///
/// Cloning is cheap and shares the queue.
#[derive(Clone)]
pub struct PriorityRequestQueue {
    inner: Arc<QueueInner>,
}

impl PriorityRequestQueue {
    /// Creates a queue that executes at most `max_concurrent` operations at
    /// once.
    pub fn new(max_concurrent: usize) -> Self {
        PriorityRequestQueue {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState {
                    pending: BTreeMap::new(),
                    by_key: HashMap::new(),
                    active: 0,
                    next_seq: 0,
                }),
                max_concurrent: max_concurrent.max(1),
            }),
        }
    }

    /// Submits `operation` under `key` at `priority` and waits for its
    /// outcome.
    ///
    /// If an entry for `key` is already queued and has not started, the call
    /// attaches as an additional waiter on that entry and `operation` is
    /// dropped; the waiter receives whatever outcome the original operation
    /// produces. Entries that have already started are no longer reachable
    /// here — collapsing onto in-flight work is the deduplicator's job.
    pub async fn enqueue(
        &self,
        key: &str,
        operation: impl Future<Output = OpResult> + Send + 'static,
        priority: Priority,
    ) -> OpResult {
        let (sender, receiver) = oneshot::channel();

        {
            let mut state = self.inner.state.lock().expect("queue state lock poisoned");
            if let Some(rank) = state.by_key.get(key).copied() {
                let entry = state
                    .pending
                    .get_mut(&rank)
                    .expect("key index points at a pending entry");
                log::debug!(
                    "attaching waiter to queued request {} ({} waiters)",
                    key,
                    entry.waiters.len() + 1
                );
                entry.waiters.push(sender);
            } else {
                let seq = state.next_seq;
                state.next_seq += 1;
                let rank: Rank = (Reverse(priority), seq);
                state.pending.insert(
                    rank,
                    PendingEntry {
                        key: key.to_string(),
                        priority,
                        operation: operation.boxed(),
                        waiters: vec![sender],
                    },
                );
                state.by_key.insert(key.to_string(), rank);
            }
        }

        Self::pump(&self.inner);

        match receiver.await {
            Ok(outcome) => outcome,
            // Sender dropped without settling: treat as a detached waiter
            Err(_) => Err(OrchestratorError::QueueCleared),
        }
    }

    /// Starts eligible entries while capacity allows.
    fn pump(inner: &Arc<QueueInner>) {
        loop {
            let entry = {
                let mut state = inner.state.lock().expect("queue state lock poisoned");
                if state.active >= inner.max_concurrent {
                    return;
                }
                let Some((_, entry)) = state.pending.pop_first() else {
                    return;
                };
                state.by_key.remove(&entry.key);
                state.active += 1;
                entry
            };

            log::debug!("starting queued request {} ({:?})", entry.key, entry.priority);
            let inner = Arc::clone(inner);
            tokio::spawn(async move {
                let outcome = entry.operation.await;
                if let Err(ref error) = outcome {
                    log::debug!("queued request {} failed: {}", entry.key, error);
                }
                for waiter in entry.waiters {
                    // A dropped receiver just means that caller went away
                    let _ = waiter.send(outcome.clone());
                }

                {
                    let mut state = inner.state.lock().expect("queue state lock poisoned");
                    state.active -= 1;
                }
                Self::pump(&inner);
            });
        }
    }

    /// Monitoring snapshot.
    pub fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock().expect("queue state lock poisoned");
        let mut per_priority: HashMap<Priority, usize> =
            Priority::iter().map(|p| (p, 0)).collect();
        for entry in state.pending.values() {
            *per_priority
                .entry(entry.priority)
                .or_default() += 1;
        }
        QueueStats {
            queued: state.pending.len(),
            active: state.active,
            per_priority,
        }
    }

    /// Rejects every not-yet-started entry with
    /// [`OrchestratorError::QueueCleared`].
    pub fn clear(&self) {
        let drained: Vec<PendingEntry> = {
            let mut state = self.inner.state.lock().expect("queue state lock poisoned");
            state.by_key.clear();
            std::mem::take(&mut state.pending).into_values().collect()
        };
        if !drained.is_empty() {
            log::debug!("clearing {} queued requests", drained.len());
        }
        Self::reject(drained);
    }

    /// Rejects not-yet-started entries at `priority` or below, leaving
    /// higher-priority entries queued in their original order.
    pub fn clear_priority_at_or_below(&self, priority: Priority) {
        let drained: Vec<PendingEntry> = {
            let mut state = self.inner.state.lock().expect("queue state lock poisoned");
            let ranks: Vec<Rank> = state
                .pending
                .iter()
                .filter(|(_, entry)| entry.priority <= priority)
                .map(|(rank, _)| *rank)
                .collect();
            let mut drained = Vec::with_capacity(ranks.len());
            for rank in ranks {
                if let Some(entry) = state.pending.remove(&rank) {
                    state.by_key.remove(&entry.key);
                    drained.push(entry);
                }
            }
            drained
        };
        if !drained.is_empty() {
            log::debug!(
                "clearing {} queued requests at or below {:?}",
                drained.len(),
                priority
            );
        }
        Self::reject(drained);
    }

    fn reject(entries: Vec<PendingEntry>) {
        for entry in entries {
            for waiter in entry.waiters {
                let _ = waiter.send(Err(OrchestratorError::QueueCleared));
            }
        }
    }
}
