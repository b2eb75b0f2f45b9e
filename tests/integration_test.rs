//! Integration tests for the orchestration layer.
//!
//! These tests exercise the full facade over real HTTP using a mock server.
//! They do not make real network requests, ensuring tests are fast and
//! reliable. Unlike the per-module unit tests, nothing here uses a paused
//! clock: the point is to observe the pipeline end to end, including the
//! reqwest call a real call site would make.

mod helpers;

#[cfg(test)]
mod tests {
    use httptest::{matchers::*, responders::*, Expectation, Server};

    use api_orchestrator::{OrchestratorError, Priority, UpstreamError};
    use serde_json::json;

    use crate::helpers::{http_get_request, roomy_config, test_orchestrator};

    /// Basic test to verify httptest setup works
    #[tokio::test]
    async fn test_mock_server_setup() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/"))
                .respond_with(status_code(200).body(r#"{"ok":true}"#)),
        );

        let url = format!("http://{}/", server.addr());
        let response = reqwest::get(&url).await.expect("request should succeed");
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_success_path_returns_remote_payload() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/timeline"))
                .respond_with(status_code(200).body(r#"{"posts":[1,2,3]}"#)),
        );

        let orchestrator = test_orchestrator();
        let url = format!("http://{}/api/timeline", server.addr());
        let result = orchestrator
            .orchestrate(http_get_request(
                "timeline:home",
                "authenticated",
                Priority::Medium,
                &url,
            ))
            .await;

        assert_eq!(result.expect("should succeed"), json!({"posts": [1, 2, 3]}));
        assert_eq!(orchestrator.agent_stats("authenticated").window_count, 1);
    }

    #[tokio::test]
    async fn test_cache_serves_second_call_without_refetching() {
        let server = Server::run();
        // The cardinality check on drop fails this test if the layer ever
        // fetches twice
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/timeline"))
                .times(1)
                .respond_with(status_code(200).body(r#"{"posts":[]}"#)),
        );

        let orchestrator = test_orchestrator();
        let url = format!("http://{}/api/timeline", server.addr());
        let request = http_get_request("timeline:home", "authenticated", Priority::Medium, &url)
            .with_cache("timeline:home", 60_000, 120_000);

        let first = orchestrator
            .orchestrate(request.clone())
            .await
            .expect("first call fetches");
        let second = orchestrator
            .orchestrate(request)
            .await
            .expect("second call hits the cache");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_same_key_collapses_to_one_fetch() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/notifications"))
                .times(1)
                .respond_with(status_code(200).body(r#"{"unread":4}"#)),
        );

        let orchestrator = test_orchestrator();
        let url = format!("http://{}/api/notifications", server.addr());

        let calls: Vec<_> = (0..6)
            .map(|_| {
                let orchestrator = orchestrator.clone();
                let request =
                    http_get_request("notifications", "authenticated", Priority::Medium, &url);
                tokio::spawn(async move { orchestrator.orchestrate(request).await })
            })
            .collect();

        for call in calls {
            let result = call.await.expect("task should not panic");
            assert_eq!(result.expect("should succeed"), json!({"unread": 4}));
        }
    }

    #[tokio::test]
    async fn test_throttled_response_surfaces_rate_limited_and_blocks_locally() {
        let server = Server::run();
        // Exactly one request may reach the server; the follow-up must be
        // denied locally
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/statuses"))
                .times(1)
                .respond_with(
                    status_code(429)
                        .append_header("Retry-After", "60")
                        .body(r#"{"error":"Too many requests"}"#),
                ),
        );

        let orchestrator = test_orchestrator();
        let url = format!("http://{}/api/statuses", server.addr());

        let result = orchestrator
            .orchestrate(http_get_request(
                "statuses",
                "authenticated",
                Priority::High,
                &url,
            ))
            .await;
        match result {
            Err(OrchestratorError::RateLimited { backoff_ms }) => {
                assert_eq!(backoff_ms, 60_000, "server hint should win over default")
            }
            other => panic!("expected RateLimited, got {:?}", other.map(|_| "payload")),
        }

        let result = orchestrator
            .orchestrate(http_get_request(
                "statuses",
                "authenticated",
                Priority::High,
                &url,
            ))
            .await;
        match result {
            Err(OrchestratorError::RateLimited { backoff_ms }) => {
                assert!(backoff_ms > 59_000, "cool-down should still be running")
            }
            other => panic!("expected local denial, got {:?}", other.map(|_| "payload")),
        }
    }

    #[tokio::test]
    async fn test_throttled_agents_are_isolated() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/statuses"))
                .times(2)
                .respond_with(status_code(429).append_header("Retry-After", "60").body("")),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/public"))
                .times(1)
                .respond_with(status_code(200).body(r#"{"posts":[]}"#)),
        );

        let orchestrator = test_orchestrator();
        let statuses_url = format!("http://{}/api/statuses", server.addr());
        let public_url = format!("http://{}/api/public", server.addr());

        // Throttle the authenticated agent
        let result = orchestrator
            .orchestrate(http_get_request(
                "statuses",
                "authenticated",
                Priority::High,
                &statuses_url,
            ))
            .await;
        assert!(matches!(result, Err(OrchestratorError::RateLimited { .. })));

        // The public agent is unaffected
        let result = orchestrator
            .orchestrate(http_get_request(
                "public-timeline",
                "public",
                Priority::Medium,
                &public_url,
            ))
            .await;
        assert!(result.is_ok(), "one agent's cool-down must not leak");

        // Reset lifts the authenticated agent's cool-down
        orchestrator.reset_agent("authenticated");
        let result = orchestrator
            .orchestrate(http_get_request(
                "statuses-again",
                "authenticated",
                Priority::High,
                &statuses_url,
            ))
            .await;
        assert!(matches!(result, Err(OrchestratorError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_upstream_error_passes_through_unmodified() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/broken"))
                .respond_with(status_code(502).body("Bad Gateway")),
        );

        let orchestrator = test_orchestrator();
        let url = format!("http://{}/api/broken", server.addr());
        let result = orchestrator
            .orchestrate(http_get_request(
                "broken",
                "authenticated",
                Priority::Medium,
                &url,
            ))
            .await;

        match result {
            Err(OrchestratorError::Upstream(cause)) => match cause.as_ref() {
                UpstreamError::Http { status, .. } => assert_eq!(status.as_u16(), 502),
                other => panic!("expected Http cause, got {other}"),
            },
            other => panic!("expected Upstream, got {:?}", other.map(|_| "payload")),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_upstream_not_rate_limited() {
        // Nothing listens on this port; the connect fails before any HTTP
        // response exists
        let orchestrator = test_orchestrator();
        let result = orchestrator
            .orchestrate(http_get_request(
                "unreachable",
                "authenticated",
                Priority::Medium,
                "http://127.0.0.1:1/api",
            ))
            .await;

        match result {
            Err(OrchestratorError::Upstream(cause)) => {
                assert!(matches!(cause.as_ref(), UpstreamError::Transport(_)))
            }
            other => panic!("expected Upstream, got {:?}", other.map(|_| "payload")),
        }
    }

    #[tokio::test]
    async fn test_stale_value_served_while_background_refresh_runs() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/timeline"))
                .times(2)
                .respond_with(status_code(200).body(r#"{"posts":[1]}"#)),
        );

        let orchestrator = test_orchestrator();
        let url = format!("http://{}/api/timeline", server.addr());
        let request = http_get_request("timeline:home", "authenticated", Priority::Medium, &url)
            .with_cache("timeline:home", 100, 60_000);

        orchestrator
            .orchestrate(request.clone())
            .await
            .expect("initial fetch");

        // Let the entry go stale but not expire
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        let stale = orchestrator
            .orchestrate(request.clone())
            .await
            .expect("stale hit still serves");
        assert_eq!(stale, json!({"posts": [1]}));

        // Give the background refresh time to land; the server-side times(2)
        // check verifies exactly one refresh happened
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    }

    #[tokio::test]
    async fn test_local_denial_never_reaches_the_network() {
        let server = Server::run();
        // No expectation is registered: any request hitting the server fails
        // the test
        let orchestrator = api_orchestrator::Orchestrator::new(api_orchestrator::OrchestratorConfig {
            max_requests_per_window: 0,
            ..roomy_config()
        });

        let url = format!("http://{}/api/timeline", server.addr());
        let result = orchestrator
            .orchestrate(http_get_request(
                "timeline",
                "authenticated",
                Priority::Medium,
                &url,
            ))
            .await;

        assert!(matches!(result, Err(OrchestratorError::RateLimited { .. })));
    }
}
