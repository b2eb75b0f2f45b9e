//! Per-agent sliding-window rate limiting.
//!
//! Each logical agent (credential scope) gets its own admission accounting:
//! a sliding window of recent admission timestamps plus a single cool-down
//! deadline. The cool-down always dominates the count check, whether it came
//! from the server (`Retry-After`) or from hitting the local ceiling.

mod limiter;
mod retry_after;
mod window;

pub use limiter::{Admission, AgentStats, RateLimiter};
