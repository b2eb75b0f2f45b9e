//! Process-level initialization.
//!
//! The orchestration layer itself is constructed directly from an
//! [`OrchestratorConfig`](crate::OrchestratorConfig); the only shared
//! resource that needs explicit setup is the logger.

mod logger;

// Re-export public API
pub use logger::init_logger_with;
