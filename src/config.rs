//! Configuration.
//!
//! The configuration surface is static and process-wide: one
//! [`OrchestratorConfig`] supplied at construction, with module-level
//! constants as the defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// constants (used as defaults)

/// Default admission ceiling per sliding window.
///
/// 300 requests per 5 minutes matches the published per-account limit of the
/// most common federated server software, so the client denies locally just
/// before the server would.
pub const DEFAULT_MAX_REQUESTS_PER_WINDOW: usize = 300;
/// Default sliding window width in milliseconds (5 minutes).
pub const DEFAULT_WINDOW_MS: u64 = 300_000;
/// Default backoff applied when the server throttles without a usable
/// `Retry-After` hint.
pub const DEFAULT_BACKOFF_MS: u64 = 30_000;
/// Local cool-down applied when the configured ceiling is hit, so the client
/// does not keep attempting admissions that would be denied remotely anyway.
/// Tune via [`OrchestratorConfig::local_cooldown_ms`] rather than relying on
/// the specific duration.
pub const DEFAULT_LOCAL_COOLDOWN_MS: u64 = 10_000;
/// Default concurrency ceiling for executing operations.
///
/// Matches the per-host connection limit browsers apply, which is the
/// environment this layer was designed for.
pub const DEFAULT_MAX_CONCURRENT: usize = 6;
/// Default entry ceiling for the bounded response cache.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 200;
/// Ceiling on any single queued/deduplicated operation.
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug)]
pub enum LogFormat {
    /// Human-readable format with colors.
    Plain,
    /// Structured JSON format for machine parsing.
    Json,
}

/// Static, process-wide configuration for the orchestration layer.
///
/// Supplied once when the [`Orchestrator`](crate::Orchestrator) is
/// constructed; there is no runtime reconfiguration surface.
///
/// # Examples
///
/// ```
/// use api_orchestrator::OrchestratorConfig;
///
/// let config = OrchestratorConfig {
///     max_requests_per_window: 5,
///     window_ms: 1_000,
///     default_backoff_ms: 5_000,
///     ..Default::default()
/// };
/// assert_eq!(config.max_concurrent, 6);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum admissions per agent within one sliding window.
    ///
    /// A ceiling of zero never admits.
    pub max_requests_per_window: usize,
    /// Sliding window width in milliseconds.
    pub window_ms: u64,
    /// Backoff in milliseconds when the server throttles without a usable
    /// `Retry-After` hint.
    pub default_backoff_ms: u64,
    /// Local cool-down in milliseconds applied when the configured ceiling is
    /// hit (as opposed to a server-imposed backoff).
    pub local_cooldown_ms: u64,
    /// Maximum number of operations executing at once.
    pub max_concurrent: usize,
    /// Entry ceiling for the response cache; once exceeded, the oldest
    /// quarter of entries is evicted in one pass.
    pub cache_max_entries: usize,
    /// Ceiling on any single queued/deduplicated operation.
    pub operation_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            max_requests_per_window: DEFAULT_MAX_REQUESTS_PER_WINDOW,
            window_ms: DEFAULT_WINDOW_MS,
            default_backoff_ms: DEFAULT_BACKOFF_MS,
            local_cooldown_ms: DEFAULT_LOCAL_COOLDOWN_MS,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            operation_timeout: OPERATION_TIMEOUT,
        }
    }
}
