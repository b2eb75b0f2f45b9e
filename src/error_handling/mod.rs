//! Error handling.
//!
//! This module provides:
//! - The failure taxonomy surfaced to callers ([`OrchestratorError`])
//! - The opaque upstream failure type ([`UpstreamError`])
//! - Categorization helpers used by the facade (throttle detection and
//!   `Retry-After` extraction)
//!
//! The one hard contract here: callers must be able to tell "denied before
//! any network attempt" ([`OrchestratorError::RateLimited`]) apart from
//! "network attempt made but failed" ([`OrchestratorError::Upstream`]), so
//! they can show a "please wait" state instead of a generic error.

mod categorization;
mod types;

// Re-export public API
pub use categorization::{is_throttled, retry_after_hint};
pub use types::{InitializationError, OrchestratorError, UpstreamError};
