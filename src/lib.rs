//! api_orchestrator: client-side API request orchestration
//!
//! This library mediates every outbound call from a client to a remote
//! service. It combines four cooperating components behind one facade:
//!
//! - per-agent sliding-window rate limiting with server-driven backoff
//!   (`Retry-After` aware),
//! - a priority queue releasing work strictly by priority and
//!   first-in-first-out within a priority, under a concurrency ceiling,
//! - deduplication of concurrent calls that share a key,
//! - a stale-while-revalidate response cache with bounded size.
//!
//! Callers can always distinguish "denied before any network attempt"
//! ([`OrchestratorError::RateLimited`]) from "attempt made but failed"
//! ([`OrchestratorError::Upstream`]).
//!
//! # Example
//!
//! ```no_run
//! use api_orchestrator::{Orchestrator, OrchestratorConfig, Priority, Request};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::new(OrchestratorConfig {
//!     max_requests_per_window: 300,
//!     window_ms: 300_000,
//!     ..Default::default()
//! });
//!
//! let request = Request::new(
//!     "timeline:home",
//!     "authenticated",
//!     Priority::Medium,
//!     || async {
//!         // Call the remote service here; any HTTP client works.
//!         Ok(json!({"posts": []}))
//!     },
//! )
//! .with_cache("timeline:home", 30_000, 300_000);
//!
//! let payload = orchestrator.orchestrate(request).await?;
//! println!("{payload}");
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your
//! application or ensure you're calling library functions within an async
//! context.

#![warn(missing_docs)]

mod cache;
pub mod config;
mod dedupe;
mod error_handling;
pub mod initialization;
mod orchestrator;
mod queue;
mod rate_limiter;

// Re-export public API
pub use cache::SwrCache;
pub use config::{LogFormat, OrchestratorConfig};
pub use dedupe::RequestDeduplicator;
pub use error_handling::{
    is_throttled, retry_after_hint, InitializationError, OrchestratorError, UpstreamError,
};
pub use orchestrator::{CacheSpec, Orchestrator, RemoteOperation, Request};
pub use queue::{Priority, PriorityRequestQueue, QueueStats};
pub use rate_limiter::{Admission, AgentStats, RateLimiter};

/// Response payload of the remote service, treated as an opaque JSON
/// document by this layer.
pub type Payload = serde_json::Value;

/// Outcome of an orchestrated operation as observed by every waiter.
pub type OpResult = Result<Payload, OrchestratorError>;
