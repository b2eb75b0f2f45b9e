//! Priority levels and queue statistics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

/// Scheduling priority of a queued operation.
///
/// `High` is for user-initiated mutations (like, follow, post), `Medium` for
/// visible-content reads, `Low` for prefetch and background refresh. Release
/// order is strictly by priority, then first-in-first-out within a priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, Serialize, Deserialize,
)]
pub enum Priority {
    /// Prefetch and background refresh.
    Low,
    /// Visible-content reads.
    Medium,
    /// User-initiated mutations.
    High,
}

/// Monitoring snapshot of the queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    /// Entries waiting to start.
    pub queued: usize,
    /// Operations currently executing.
    pub active: usize,
    /// Waiting entries broken down by priority.
    pub per_priority: HashMap<Priority, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
    }

    #[test]
    fn test_priority_iterates_all_levels() {
        let levels: Vec<Priority> = Priority::iter().collect();
        assert_eq!(levels, vec![Priority::Low, Priority::Medium, Priority::High]);
    }

    #[test]
    fn test_priority_serializes_as_string() {
        assert_eq!(
            serde_json::to_string(&Priority::High).expect("serializes"),
            r#""High""#
        );
    }
}
