//! Restart policy bookkeeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use berth_common::types::RestartPolicy;

const BACKOFF_MULTIPLIER: u32 = 2;
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
/// A run at least this long resets the backoff.
const STABLE_RUN: Duration = Duration::from_secs(10);

/// Decides whether and when an exited container is restarted.
///
/// Clones share the cancellation flag, so cancelling any clone stops
/// every pending restart decision for that container.
#[derive(Debug, Clone)]
pub struct RestartManager {
    policy: RestartPolicy,
    restart_count: u64,
    backoff: Duration,
    canceled: Arc<AtomicBool>,
}

impl RestartManager {
    /// Creates a manager for `policy` that has already restarted `restart_count` times.
    #[must_use]
    pub fn new(policy: RestartPolicy, restart_count: u64) -> Self {
        Self {
            policy,
            restart_count,
            backoff: Duration::ZERO,
            canceled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stops all future restarts.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once cancelled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Restarts performed so far.
    #[must_use]
    pub const fn restart_count(&self) -> u64 {
        self.restart_count
    }

    /// Decides whether to restart after an exit, and after how long.
    ///
    /// Returns the delay before the restart, or `None` if the container
    /// stays down. A positive decision counts as a restart.
    pub fn should_restart(
        &mut self,
        exit_code: i32,
        manually_stopped: bool,
        ran_for: Duration,
    ) -> Option<Duration> {
        if self.is_canceled() {
            return None;
        }

        let restart = match self.policy.name.as_str() {
            "always" => true,
            "unless-stopped" => !manually_stopped,
            "on-failure" => {
                let max = u64::try_from(self.policy.maximum_retry_count).unwrap_or(0);
                exit_code != 0 && (max == 0 || self.restart_count < max)
            }
            _ => false,
        };
        if !restart {
            return None;
        }

        self.backoff = if ran_for >= STABLE_RUN || self.backoff.is_zero() {
            INITIAL_BACKOFF
        } else {
            (self.backoff * BACKOFF_MULTIPLIER).min(MAX_BACKOFF)
        };
        self.restart_count += 1;
        Some(self.backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(name: &str, max: i64) -> RestartPolicy {
        RestartPolicy {
            name: name.into(),
            maximum_retry_count: max,
        }
    }

    #[test]
    fn no_policy_never_restarts() {
        let mut rm = RestartManager::new(policy("no", 0), 0);
        assert!(rm.should_restart(1, false, Duration::ZERO).is_none());
    }

    #[test]
    fn on_failure_respects_retry_limit() {
        let mut rm = RestartManager::new(policy("on-failure", 2), 0);
        assert!(rm.should_restart(0, false, Duration::ZERO).is_none());
        assert!(rm.should_restart(1, false, Duration::ZERO).is_some());
        assert!(rm.should_restart(1, false, Duration::ZERO).is_some());
        assert!(rm.should_restart(1, false, Duration::ZERO).is_none());
        assert_eq!(rm.restart_count(), 2);
    }

    #[test]
    fn unless_stopped_honours_manual_stop() {
        let mut rm = RestartManager::new(policy("unless-stopped", 0), 0);
        assert!(rm.should_restart(0, true, Duration::ZERO).is_none());
        assert!(rm.should_restart(0, false, Duration::ZERO).is_some());
    }

    #[test]
    fn backoff_doubles_and_resets_after_stable_run() {
        let mut rm = RestartManager::new(policy("always", 0), 0);
        let first = rm.should_restart(1, false, Duration::ZERO).unwrap();
        let second = rm.should_restart(1, false, Duration::ZERO).unwrap();
        assert_eq!(second, first * 2);
        let after_stable = rm.should_restart(1, false, STABLE_RUN).unwrap();
        assert_eq!(after_stable, INITIAL_BACKOFF);
    }

    #[test]
    fn cancelled_clone_stops_restarts() {
        let mut rm = RestartManager::new(policy("always", 0), 0);
        rm.clone().cancel();
        assert!(rm.should_restart(1, false, Duration::ZERO).is_none());
    }
}
