//! Sliding window of admission timestamps.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Tracks when an agent's recent admissions happened.
///
/// Timestamps older than the window width are purged before every decision,
/// so the count always reflects the current window only.
pub(crate) struct AdmissionWindow {
    timestamps: VecDeque<Instant>,
    width: Duration,
}

impl AdmissionWindow {
    pub(crate) fn new(width: Duration) -> Self {
        AdmissionWindow {
            timestamps: VecDeque::new(),
            width,
        }
    }

    /// Drops timestamps that have aged out of the window.
    pub(crate) fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) > self.width {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Records an admission at `now`.
    pub(crate) fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }

    pub(crate) fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Time until the oldest timestamp ages out and frees a slot.
    ///
    /// `None` when the window is empty, which can only mean the ceiling
    /// itself admits nothing.
    pub(crate) fn time_until_capacity(&self, now: Instant) -> Option<Duration> {
        self.timestamps
            .front()
            .map(|oldest| (*oldest + self.width).saturating_duration_since(now))
    }
}
