//! Request deduplication.
//!
//! Collapses concurrent calls that share a key into a single in-flight
//! operation. The first caller registers the operation; everyone who arrives
//! while it is outstanding joins it and observes the same outcome, success or
//! failure. The registry entry is removed unconditionally when the call
//! settles — an entry that survived an error would wedge its key for the
//! lifetime of the process.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::OpResult;

type SharedOutcome = Shared<BoxFuture<'static, OpResult>>;

struct InFlight {
    /// Registration id. Settlement only deregisters the entry it created,
    /// so a settle racing a `clear()` cannot evict a newer registration
    /// under the same key.
    id: u64,
    outcome: SharedOutcome,
}

/// Collapses concurrent calls with an identical key into one in-flight
/// operation.
///
/// Cloning is cheap and shares the registry; the facade owns one instance
/// and hands clones to whatever needs them, so tests can always construct
/// isolated registries.
#[derive(Clone)]
pub struct RequestDeduplicator {
    in_flight: Arc<Mutex<HashMap<String, InFlight>>>,
    next_id: Arc<AtomicU64>,
}

impl RequestDeduplicator {
    /// Creates an empty registry.
    pub fn new() -> Self {
        RequestDeduplicator {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Runs `operation` under `key`, or joins the operation already in
    /// flight for that key.
    ///
    /// While at least one call is outstanding for a key, the underlying
    /// operation is invoked exactly once no matter how many callers join;
    /// all of them observe the same outcome.
    pub async fn dedupe<F>(&self, key: &str, operation: F) -> OpResult
    where
        F: Future<Output = OpResult> + Send + 'static,
    {
        let outcome = {
            let mut in_flight = self
                .in_flight
                .lock()
                .expect("in-flight registry lock poisoned");

            if let Some(existing) = in_flight.get(key) {
                log::debug!("joining in-flight request for {}", key);
                existing.outcome.clone()
            } else {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let registry = Arc::clone(&self.in_flight);
                let owned_key = key.to_string();

                let outcome = async move {
                    let result = operation.await;
                    // Deregister on settlement, success or failure alike
                    let mut in_flight =
                        registry.lock().expect("in-flight registry lock poisoned");
                    if in_flight.get(&owned_key).is_some_and(|entry| entry.id == id) {
                        in_flight.remove(&owned_key);
                    }
                    result
                }
                .boxed()
                .shared();

                in_flight.insert(
                    key.to_string(),
                    InFlight {
                        id,
                        outcome: outcome.clone(),
                    },
                );
                outcome
            }
        };

        outcome.await
    }

    /// Whether a call for `key` is currently outstanding.
    pub fn is_pending(&self, key: &str) -> bool {
        self.in_flight
            .lock()
            .expect("in-flight registry lock poisoned")
            .contains_key(key)
    }

    /// Number of keys with an outstanding call.
    pub fn pending_count(&self) -> usize {
        self.in_flight
            .lock()
            .expect("in-flight registry lock poisoned")
            .len()
    }

    /// Forgets all bookkeeping.
    ///
    /// Outstanding operations are not cancelled — there is no remote
    /// cancellation primitive — and callers already joined to them still
    /// receive their outcomes. Subsequent calls for the same keys start
    /// fresh operations.
    pub fn clear(&self) {
        self.in_flight
            .lock()
            .expect("in-flight registry lock poisoned")
            .clear();
    }
}

impl Default for RequestDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}
