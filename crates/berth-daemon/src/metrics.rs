//! Lifecycle action metrics.
//!
//! Counts completed actions and accumulates how long they took, keyed by
//! action name (`start`, ...).

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Accumulated timings for one action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionStats {
    /// Completed actions.
    pub count: u64,
    /// Sum of all durations.
    pub total: Duration,
    /// Duration of the most recent action.
    pub last: Duration,
}

/// Per-action timing registry.
#[derive(Debug, Default)]
pub struct ActionMetrics {
    actions: Mutex<BTreeMap<&'static str, ActionStats>>,
}

impl ActionMetrics {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed `action` that began at `start`.
    pub fn update_since(&self, action: &'static str, start: Instant) {
        let elapsed = start.elapsed();
        if let Ok(mut actions) = self.actions.lock() {
            let stats = actions.entry(action).or_default();
            stats.count += 1;
            stats.total += elapsed;
            stats.last = elapsed;
        }
        tracing::debug!(action, elapsed_ms = elapsed.as_millis(), "action completed");
    }

    /// Returns the accumulated timings for `action`.
    #[must_use]
    pub fn snapshot(&self, action: &str) -> Option<ActionStats> {
        self.actions.lock().ok()?.get(action).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_action_has_no_stats() {
        assert!(ActionMetrics::new().snapshot("start").is_none());
    }

    #[test]
    fn updates_accumulate() {
        let metrics = ActionMetrics::new();
        let start = Instant::now();
        metrics.update_since("start", start);
        metrics.update_since("start", start);
        let stats = metrics.snapshot("start").unwrap();
        assert_eq!(stats.count, 2);
        assert!(stats.total >= stats.last);
    }
}
