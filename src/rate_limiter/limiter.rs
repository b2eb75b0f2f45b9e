//! Per-agent admission control.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::OrchestratorConfig;

use super::retry_after::parse_retry_after;
use super::window::AdmissionWindow;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call may proceed to the network; a timestamp was recorded.
    Allowed,
    /// The call must not proceed before `backoff_ms` has elapsed.
    Denied {
        /// Milliseconds until the agent may attempt again.
        backoff_ms: u64,
    },
}

/// Monitoring snapshot for one agent.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AgentStats {
    /// Admissions recorded within the current window.
    pub window_count: usize,
    /// Remaining cool-down in milliseconds, zero if none.
    pub backoff_ms: u64,
}

struct AgentState {
    window: AdmissionWindow,
    blocked_until: Option<Instant>,
}

/// Tracks, per logical agent, how many calls were admitted in the current
/// sliding window and whether the agent is under an externally imposed
/// cool-down.
///
/// Agents (e.g. "authenticated" versus "public" identity) are created lazily
/// on first use and are fully isolated from one another: exhausting one
/// agent's window never affects another's counters or cool-down.
///
/// All methods are synchronous; state lives behind a `std::sync::Mutex` that
/// is never held across an await point, so check-then-record sequences are
/// atomic and double admission cannot happen.
pub struct RateLimiter {
    window_width: Duration,
    max_per_window: usize,
    default_backoff: Duration,
    local_cooldown: Duration,
    agents: Mutex<HashMap<String, AgentState>>,
}

impl RateLimiter {
    /// Creates a rate limiter from the orchestration config.
    pub fn new(config: &OrchestratorConfig) -> Self {
        RateLimiter {
            window_width: Duration::from_millis(config.window_ms),
            max_per_window: config.max_requests_per_window,
            default_backoff: Duration::from_millis(config.default_backoff_ms),
            local_cooldown: Duration::from_millis(config.local_cooldown_ms),
            agents: Mutex::new(HashMap::new()),
        }
    }

    /// Decides whether `agent` may make a call right now.
    ///
    /// An active cool-down dominates the window count check. Otherwise aged
    /// timestamps are pruned and the remaining count is compared against the
    /// ceiling: admission records a new timestamp, denial sets a local
    /// cool-down lasting until the window can next admit, capped at the
    /// configured `local_cooldown_ms`, so the agent does not hammer a window
    /// that cannot admit it.
    pub fn admit(&self, agent: &str) -> Admission {
        let now = Instant::now();
        let mut agents = self.agents.lock().expect("rate limit state lock poisoned");
        let state = agents
            .entry(agent.to_string())
            .or_insert_with(|| AgentState {
                window: AdmissionWindow::new(self.window_width),
                blocked_until: None,
            });

        if let Some(blocked_until) = state.blocked_until {
            if blocked_until > now {
                return Admission::Denied {
                    backoff_ms: duration_ms(blocked_until.saturating_duration_since(now)),
                };
            }
            state.blocked_until = None;
        }

        state.window.prune(now);
        if self.max_per_window == 0 || state.window.len() >= self.max_per_window {
            let cooldown = state
                .window
                .time_until_capacity(now)
                .unwrap_or(self.local_cooldown)
                .min(self.local_cooldown)
                .max(Duration::from_millis(1));
            state.blocked_until = Some(now + cooldown);
            log::debug!(
                "agent {} exhausted its window, local cool-down {}ms",
                agent,
                duration_ms(cooldown)
            );
            return Admission::Denied {
                backoff_ms: duration_ms(cooldown),
            };
        }

        state.window.record(now);
        Admission::Allowed
    }

    /// Records a throttling signal from the remote service.
    ///
    /// Prefers the server's `Retry-After` hint (delay seconds or HTTP date)
    /// over the configured default backoff. Repeated calls overwrite the
    /// cool-down with the newest value; backoffs do not stack. Returns the
    /// applied backoff in milliseconds.
    pub fn record_throttled(&self, agent: &str, server_hint: Option<&str>) -> u64 {
        let backoff = server_hint
            .and_then(parse_retry_after)
            .unwrap_or(self.default_backoff);
        let now = Instant::now();

        let mut agents = self.agents.lock().expect("rate limit state lock poisoned");
        let state = agents
            .entry(agent.to_string())
            .or_insert_with(|| AgentState {
                window: AdmissionWindow::new(self.window_width),
                blocked_until: None,
            });
        state.blocked_until = Some(now + backoff);

        let backoff_ms = duration_ms(backoff);
        log::warn!(
            "agent {} throttled by server, backing off {}ms",
            agent,
            backoff_ms
        );
        backoff_ms
    }

    /// Monitoring snapshot for `agent`.
    pub fn stats(&self, agent: &str) -> AgentStats {
        let now = Instant::now();
        let mut agents = self.agents.lock().expect("rate limit state lock poisoned");
        match agents.get_mut(agent) {
            Some(state) => {
                state.window.prune(now);
                let backoff_ms = state
                    .blocked_until
                    .filter(|until| *until > now)
                    .map(|until| duration_ms(until.saturating_duration_since(now)))
                    .unwrap_or(0);
                AgentStats {
                    window_count: state.window.len(),
                    backoff_ms,
                }
            }
            None => AgentStats {
                window_count: 0,
                backoff_ms: 0,
            },
        }
    }

    /// Clears all accounting for `agent`.
    pub fn reset(&self, agent: &str) {
        self.agents
            .lock()
            .expect("rate limit state lock poisoned")
            .remove(agent);
    }
}

fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
