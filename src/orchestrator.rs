//! Orchestration facade.
//!
//! The composition point of the layer. For one logical request the facade
//! consults the cache, falls back through rate-limit admission to the
//! priority queue, collapses identical in-flight calls in the deduplicator,
//! races the remote invoke against the operation timeout, and records the
//! outcome back into the cache and the rate limiter.
//!
//! Data flows one direction: call site → facade → (cache hit?) → queue →
//! deduplicator → remote service → fan-out to waiters → cache update →
//! rate-limit state update.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::cache::SwrCache;
use crate::config::OrchestratorConfig;
use crate::dedupe::RequestDeduplicator;
use crate::error_handling::{is_throttled, retry_after_hint, OrchestratorError, UpstreamError};
use crate::queue::{Priority, PriorityRequestQueue, QueueStats};
use crate::rate_limiter::{Admission, AgentStats, RateLimiter};
use crate::{OpResult, Payload};

/// The remote operation attached to a request.
///
/// Behind an `Arc<dyn Fn>` rather than a plain future so the cache can retain
/// it as the revalidation action and invoke it again later.
pub type RemoteOperation =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Payload, UpstreamError>> + Send + Sync>;

/// Caching instructions attached to a request.
#[derive(Clone)]
pub struct CacheSpec {
    /// Cache key; usually, but not necessarily, the request key.
    pub key: String,
    /// How long a stored result is served without any side effect.
    pub fresh_ms: u64,
    /// How long past freshness a stored result is still served while a
    /// background refresh runs.
    pub stale_ms: u64,
}

/// One logical request from a call site.
#[derive(Clone)]
pub struct Request {
    /// Identity key: concurrent and queued calls sharing it collapse into
    /// one execution.
    pub key: String,
    /// Rate-limit domain the call is accounted against.
    pub agent_id: String,
    /// Scheduling priority.
    pub priority: Priority,
    /// The remote invoke.
    pub operation: RemoteOperation,
    /// Optional caching instructions; `None` bypasses the cache entirely.
    pub cache: Option<CacheSpec>,
}

impl Request {
    /// Builds a request without caching instructions.
    pub fn new<F, Fut>(
        key: impl Into<String>,
        agent_id: impl Into<String>,
        priority: Priority,
        operation: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Payload, UpstreamError>> + Send + 'static,
    {
        Request {
            key: key.into(),
            agent_id: agent_id.into(),
            priority,
            operation: Arc::new(move || operation().boxed()),
            cache: None,
        }
    }

    /// Attaches caching instructions.
    pub fn with_cache(mut self, key: impl Into<String>, fresh_ms: u64, stale_ms: u64) -> Self {
        self.cache = Some(CacheSpec {
            key: key.into(),
            fresh_ms,
            stale_ms,
        });
        self
    }
}

struct Inner {
    config: OrchestratorConfig,
    limiter: RateLimiter,
    queue: PriorityRequestQueue,
    dedupe: RequestDeduplicator,
    cache: SwrCache,
}

/// Mediates every outbound call from the client to the remote service.
///
/// Owns one instance of each component; nothing here is process-global, so
/// tests (and multiple accounts in one process) construct isolated
/// orchestrators. Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Creates an orchestrator from the given configuration.
    pub fn new(config: OrchestratorConfig) -> Self {
        Orchestrator {
            inner: Arc::new(Inner {
                limiter: RateLimiter::new(&config),
                queue: PriorityRequestQueue::new(config.max_concurrent),
                dedupe: RequestDeduplicator::new(),
                cache: SwrCache::with_max_entries(config.cache_max_entries),
                config,
            }),
        }
    }

    /// Runs one logical request through the full pipeline.
    ///
    /// A cache hit returns immediately; a stale hit additionally schedules a
    /// background refresh that re-enters the pipeline at [`Priority::Low`].
    /// On a miss the call is admitted (or denied with
    /// [`OrchestratorError::RateLimited`] before any network attempt), queued
    /// at the request's priority, deduplicated by key, and raced against the
    /// operation timeout. A successful result populates the cache when the
    /// request carries a [`CacheSpec`].
    pub async fn orchestrate(&self, request: Request) -> OpResult {
        if let Some(ref spec) = request.cache {
            let revalidate = {
                let this = self.clone();
                let key = request.key.clone();
                let agent = request.agent_id.clone();
                let operation = Arc::clone(&request.operation);
                move || this.execute(key, agent, Priority::Low, operation)
            };
            if let Some(value) = self.inner.cache.get(&spec.key, revalidate) {
                log::debug!("cache hit for {}", spec.key);
                return Ok(value);
            }
        }

        let outcome = self
            .execute(
                request.key.clone(),
                request.agent_id.clone(),
                request.priority,
                Arc::clone(&request.operation),
            )
            .await;

        if let (Ok(value), Some(spec)) = (&outcome, &request.cache) {
            self.inner
                .cache
                .set(&spec.key, value.clone(), spec.fresh_ms, spec.stale_ms);
        }
        outcome
    }

    /// Admission → queue → deduplicator → timed remote invoke.
    ///
    /// Shared by the miss path and by background revalidation, which is why
    /// it does not touch the cache: `orchestrate` populates it on the miss
    /// path, the cache's own refresh task does on revalidation.
    fn execute(
        &self,
        key: String,
        agent: String,
        priority: Priority,
        operation: RemoteOperation,
    ) -> BoxFuture<'static, OpResult> {
        let this = self.clone();
        async move {
            match this.inner.limiter.admit(&agent) {
                Admission::Denied { backoff_ms } => {
                    log::debug!("{} denied for agent {}, backoff {}ms", key, agent, backoff_ms);
                    return Err(OrchestratorError::RateLimited { backoff_ms });
                }
                Admission::Allowed => {}
            }

            let invoke = {
                let this = this.clone();
                let agent = agent.clone();
                let timeout = this.inner.config.operation_timeout;
                async move {
                    match tokio::time::timeout(timeout, operation()).await {
                        Ok(Ok(payload)) => Ok(payload),
                        Ok(Err(cause)) => {
                            if is_throttled(&cause) {
                                let hint = retry_after_hint(&cause);
                                let backoff_ms = this
                                    .inner
                                    .limiter
                                    .record_throttled(&agent, hint.as_deref());
                                Err(OrchestratorError::RateLimited { backoff_ms })
                            } else {
                                Err(OrchestratorError::Upstream(Arc::new(cause)))
                            }
                        }
                        Err(_) => Err(OrchestratorError::TimedOut {
                            elapsed_ms: timeout.as_millis() as u64,
                        }),
                    }
                }
            };

            let dedupe = this.inner.dedupe.clone();
            let slot_key = key.clone();
            let queued = async move { dedupe.dedupe(&slot_key, invoke).await };
            this.inner.queue.enqueue(&key, queued, priority).await
        }
        .boxed()
    }

    /// Monitoring snapshot of the queue.
    pub fn queue_stats(&self) -> QueueStats {
        self.inner.queue.stats()
    }

    /// Monitoring snapshot of one agent's rate-limit accounting.
    pub fn agent_stats(&self, agent: &str) -> AgentStats {
        self.inner.limiter.stats(agent)
    }

    /// Number of keys with an in-flight deduplicated call.
    pub fn pending_count(&self) -> usize {
        self.inner.dedupe.pending_count()
    }

    /// Rejects every not-yet-started queued entry with
    /// [`OrchestratorError::QueueCleared`].
    pub fn clear_queue(&self) {
        self.inner.queue.clear();
    }

    /// Rejects not-yet-started queued entries at `priority` or below.
    pub fn clear_priority_at_or_below(&self, priority: Priority) {
        self.inner.queue.clear_priority_at_or_below(priority);
    }

    /// Clears rate-limit accounting for `agent`.
    pub fn reset_agent(&self, agent: &str) {
        self.inner.limiter.reset(agent);
    }
}
