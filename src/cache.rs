//! Stale-while-revalidate response cache.
//!
//! Entries carry two horizons: while fresh, a read returns the value with no
//! side effect; between fresh and stale, a read returns the value immediately
//! and schedules at most one background revalidation; past stale the entry is
//! treated as absent. A failed revalidation leaves the stale entry in place
//! (serve-stale-on-error) rather than evicting it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;

use crate::{OpResult, Payload};

struct CacheEntry {
    value: Payload,
    fresh_until: Instant,
    stale_until: Instant,
    // Originating durations, reused when a revalidation refreshes the entry
    fresh_for: Duration,
    stale_for: Duration,
    revalidating: bool,
    updated_at: Instant,
}

/// Keyed response cache with stale-while-revalidate semantics and bounded
/// size.
///
/// Cloning is cheap and shares the underlying store.
#[derive(Clone)]
pub struct SwrCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    max_entries: Option<usize>,
}

impl SwrCache {
    /// Creates an unbounded cache.
    pub fn new() -> Self {
        SwrCache {
            entries: Arc::new(Mutex::new(HashMap::new())),
            max_entries: None,
        }
    }

    /// Creates a cache that evicts once `max_entries` is exceeded.
    ///
    /// Eviction happens in one pass: the oldest quarter of entries by update
    /// time is dropped, which amortizes cleanup instead of paying it on
    /// every insert.
    pub fn with_max_entries(max_entries: usize) -> Self {
        SwrCache {
            entries: Arc::new(Mutex::new(HashMap::new())),
            max_entries: Some(max_entries.max(1)),
        }
    }

    /// Reads `key`, possibly scheduling a background revalidation.
    ///
    /// Returns the stored value while it is fresh or stale; returns `None`
    /// past the stale horizon (the expired entry is dropped on observation)
    /// or when no entry exists. When the value is stale but servable,
    /// `revalidate` is invoked at most once across concurrent reads of the
    /// key; its failure is caught, logged, and discarded so the stale value
    /// keeps being served.
    pub fn get<F>(&self, key: &str, revalidate: F) -> Option<Payload>
    where
        F: FnOnce() -> BoxFuture<'static, OpResult>,
    {
        let now = Instant::now();
        // Decide under the lock; run the caller's closure outside it
        let (value, refresh_horizons) = {
            let mut entries = self.entries.lock().expect("cache lock poisoned");

            let entry = match entries.get_mut(key) {
                Some(entry) => entry,
                None => return None,
            };

            if now >= entry.stale_until {
                entries.remove(key);
                return None;
            }

            let value = entry.value.clone();
            if now >= entry.fresh_until && !entry.revalidating {
                entry.revalidating = true;
                (value, Some((entry.fresh_for, entry.stale_for)))
            } else {
                (value, None)
            }
        };

        if let Some((fresh_for, stale_for)) = refresh_horizons {
            let store = Arc::clone(&self.entries);
            let owned_key = key.to_string();
            let refresh = revalidate();

            // Detached unit of work; its failure must never become an
            // unhandled rejection
            tokio::spawn(async move {
                let outcome = refresh.await;
                let mut entries = store.lock().expect("cache lock poisoned");
                match outcome {
                    Ok(fresh_value) => {
                        let now = Instant::now();
                        entries.insert(
                            owned_key.clone(),
                            CacheEntry {
                                value: fresh_value,
                                fresh_until: now + fresh_for,
                                stale_until: now + stale_for,
                                fresh_for,
                                stale_for,
                                revalidating: false,
                                updated_at: now,
                            },
                        );
                        log::debug!("revalidated cache entry {}", owned_key);
                    }
                    Err(error) => {
                        if let Some(entry) = entries.get_mut(&owned_key) {
                            entry.revalidating = false;
                        }
                        log::debug!(
                            "revalidation of {} failed, serving stale: {}",
                            owned_key,
                            error
                        );
                    }
                }
            });
        }

        Some(value)
    }

    /// Stores `value` under `key` with the given freshness and staleness
    /// horizons in milliseconds.
    ///
    /// `stale_ms` is clamped up to `fresh_ms` so the fresh horizon can never
    /// outlive the stale one.
    pub fn set(&self, key: &str, value: Payload, fresh_ms: u64, stale_ms: u64) {
        let now = Instant::now();
        let fresh_for = Duration::from_millis(fresh_ms);
        let stale_for = Duration::from_millis(stale_ms.max(fresh_ms));

        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                fresh_until: now + fresh_for,
                stale_until: now + stale_for,
                fresh_for,
                stale_for,
                revalidating: false,
                updated_at: now,
            },
        );

        if let Some(max) = self.max_entries {
            if entries.len() > max {
                evict_oldest_quarter(&mut entries);
            }
        }
    }

    /// Number of stored entries, including ones past their horizons that
    /// have not been observed yet.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SwrCache {
    fn default() -> Self {
        Self::new()
    }
}

fn evict_oldest_quarter(entries: &mut HashMap<String, CacheEntry>) {
    let evict_count = (entries.len() / 4).max(1);
    let mut by_age: Vec<(String, Instant)> = entries
        .iter()
        .map(|(key, entry)| (key.clone(), entry.updated_at))
        .collect();
    by_age.sort_by_key(|(_, updated_at)| *updated_at);

    for (key, _) in by_age.into_iter().take(evict_count) {
        entries.remove(&key);
    }
    log::debug!("evicted {} oldest cache entries", evict_count);
}
