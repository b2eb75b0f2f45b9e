//! Error type definitions.
//!
//! This module defines the failure taxonomy of the orchestration layer. The
//! taxonomy is deliberately small: callers need to distinguish "denied before
//! any network attempt was made" from "an attempt was made and failed", and
//! little else.

use std::sync::Arc;

use log::SetLoggerError;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Failure reported by the remote service collaborator.
///
/// The orchestration layer only ever inspects the status code (429
/// specifically) and the `Retry-After` header; everything else is passed
/// through untouched for the call site to interpret.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// The remote service answered with a non-success HTTP status.
    #[error("upstream returned HTTP {status}")]
    Http {
        /// Response status code.
        status: StatusCode,
        /// Response headers, preserved for `Retry-After` inspection.
        headers: HeaderMap,
    },

    /// The call never produced an HTTP response (connect failure, protocol
    /// error, and so on).
    #[error("upstream transport failure: {0}")]
    Transport(#[from] anyhow::Error),
}

impl UpstreamError {
    /// Convenience constructor for an HTTP-status failure without headers.
    pub fn http_status(status: StatusCode) -> Self {
        UpstreamError::Http {
            status,
            headers: HeaderMap::new(),
        }
    }
}

/// Failures surfaced to callers of the orchestration layer.
///
/// `Clone` is required because one settlement fans out to every waiter that
/// joined the queued or in-flight entry; the upstream cause is therefore held
/// behind an `Arc`.
#[derive(Error, Debug, Clone)]
pub enum OrchestratorError {
    /// Denied locally, or throttled by the server. No retry will succeed
    /// before `backoff_ms` has elapsed. Call sites typically render this as a
    /// "please wait" state rather than a generic error.
    #[error("rate limited; retry in {backoff_ms}ms")]
    RateLimited {
        /// Milliseconds until the agent may attempt again.
        backoff_ms: u64,
    },

    /// The waiter was detached by an explicit queue-management call before
    /// its operation started.
    #[error("request was cleared from the queue before it started")]
    QueueCleared,

    /// The per-operation ceiling elapsed. The underlying call may still run
    /// to completion; its result is discarded.
    #[error("request timed out after {elapsed_ms}ms")]
    TimedOut {
        /// The ceiling that elapsed, in milliseconds.
        elapsed_ms: u64,
    },

    /// A network attempt was made and failed. The cause passes through
    /// unmodified.
    #[error("upstream request failed: {0}")]
    Upstream(#[source] Arc<UpstreamError>),
}

impl OrchestratorError {
    /// The backoff attached to a [`OrchestratorError::RateLimited`] failure,
    /// if that is what this is.
    pub fn backoff_ms(&self) -> Option<u64> {
        match self {
            OrchestratorError::RateLimited { backoff_ms } => Some(*backoff_ms),
            _ => None,
        }
    }
}
