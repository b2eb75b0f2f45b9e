//! `Retry-After` header parsing.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Parses a `Retry-After` value into a backoff duration.
///
/// The header comes in two forms (RFC 9110 §10.2.3): a delay in seconds
/// (`Retry-After: 120`) or an HTTP date (`Retry-After: Fri, 31 Dec 1999
/// 23:59:59 GMT`). The date form is interpreted relative to now and clamped
/// to zero if it is already in the past. Returns `None` when the value is
/// neither form, so the caller can fall back to its configured default.
pub(crate) fn parse_retry_after(raw: &str) -> Option<Duration> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(seconds) = trimmed.parse::<i64>() {
        return Some(Duration::from_secs(seconds.max(0) as u64));
    }

    if let Ok(date) = DateTime::parse_from_rfc2822(trimmed) {
        let remaining = date.with_timezone(&Utc) - Utc::now();
        // Negative deltas (date already past) clamp to zero
        return Some(remaining.to_std().unwrap_or(Duration::ZERO));
    }

    None
}
