//! Upstream failure categorization.
//!
//! The facade only ever asks two questions of an upstream failure: was it a
//! throttling response, and if so what retry hint did the server attach.

use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;

use super::types::UpstreamError;

/// Whether the remote service signalled rate limiting (HTTP 429).
pub fn is_throttled(error: &UpstreamError) -> bool {
    matches!(
        error,
        UpstreamError::Http { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS
    )
}

/// The raw `Retry-After` header value attached to a throttling response.
///
/// Returns `None` for transport failures, responses without the header, and
/// header values that are not valid UTF-8. Parsing of the value (delay
/// seconds versus HTTP date) happens in the rate limiter.
pub fn retry_after_hint(error: &UpstreamError) -> Option<String> {
    match error {
        UpstreamError::Http { headers, .. } => headers
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        UpstreamError::Transport(_) => None,
    }
}
