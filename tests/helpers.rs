// Shared test helpers for exercising the orchestration layer over real HTTP.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::time::Duration;

use api_orchestrator::{
    Orchestrator, OrchestratorConfig, Payload, Priority, Request, UpstreamError,
};

/// Configuration with a roomy window so tests exercise the pipeline rather
/// than the limiter, unless they override it.
#[allow(dead_code)] // Used by other test files
pub fn roomy_config() -> OrchestratorConfig {
    OrchestratorConfig {
        max_requests_per_window: 1_000,
        window_ms: 60_000,
        default_backoff_ms: 5_000,
        local_cooldown_ms: 10_000,
        max_concurrent: 6,
        cache_max_entries: 50,
        operation_timeout: Duration::from_secs(15),
    }
}

#[allow(dead_code)] // Used by other test files
pub fn test_orchestrator() -> Orchestrator {
    Orchestrator::new(roomy_config())
}

/// Builds a request whose operation GETs `url` and maps the response the way
/// a real call site would: success bodies parse as JSON payloads, non-success
/// statuses become `UpstreamError::Http` with headers preserved, and
/// connection-level failures become `UpstreamError::Transport`.
#[allow(dead_code)] // Used by other test files
pub fn http_get_request(key: &str, agent: &str, priority: Priority, url: &str) -> Request {
    let url = url.to_string();
    Request::new(key, agent, priority, move || {
        let url = url.clone();
        async move {
            let response = reqwest::get(&url)
                .await
                .map_err(|e| UpstreamError::Transport(anyhow::Error::new(e)))?;
            let status = response.status();
            let headers = response.headers().clone();
            if status.is_success() {
                let body = response
                    .text()
                    .await
                    .map_err(|e| UpstreamError::Transport(anyhow::Error::new(e)))?;
                serde_json::from_str::<Payload>(&body)
                    .map_err(|e| UpstreamError::Transport(anyhow::Error::new(e)))
            } else {
                Err(UpstreamError::Http { status, headers })
            }
        }
    })
}
