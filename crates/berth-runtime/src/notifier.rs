//! Keyed one-shot exit notification.
//!
//! Every tracked container ID maps to an [`ExitNotifier`]. Closing a
//! notifier wakes every waiter exactly once and removes the notifier from
//! its registry, but only if the registry still points at that same
//! instance: a container restarted quickly gets a fresh notifier that the
//! old one must not evict.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, Once, Weak};
use std::time::Duration;

type Table = Mutex<HashMap<String, Arc<ExitNotifier>>>;

#[derive(Debug, Default)]
struct Signal {
    closed: Mutex<bool>,
    cond: Condvar,
}

/// A close-once exit signal for one container instance.
#[derive(Debug)]
pub struct ExitNotifier {
    id: String,
    registry: Weak<Table>,
    once: Once,
    signal: Arc<Signal>,
}

/// Read-only view of an [`ExitNotifier`]; clone freely.
#[derive(Debug, Clone)]
pub struct ExitWaiter {
    signal: Arc<Signal>,
}

/// Registry of live exit notifiers keyed by container ID.
#[derive(Debug, Default)]
pub struct ExitNotifiers {
    table: Arc<Table>,
}

impl ExitNotifier {
    /// The container ID this notifier belongs to.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fires the notification. Only the first call has any effect.
    pub fn close(&self) {
        self.once.call_once(|| {
            if let Ok(mut closed) = self.signal.closed.lock() {
                *closed = true;
            }
            self.signal.cond.notify_all();

            let Some(table) = self.registry.upgrade() else {
                return;
            };
            let Ok(mut entries) = table.lock() else {
                return;
            };
            let is_current = entries
                .get(&self.id)
                .is_some_and(|current| std::ptr::eq(Arc::as_ptr(current), self));
            if is_current {
                let _ = entries.remove(&self.id);
            }
        });
    }

    /// Returns a handle that observes this notifier's closure.
    #[must_use]
    pub fn wait(&self) -> ExitWaiter {
        ExitWaiter {
            signal: Arc::clone(&self.signal),
        }
    }
}

impl ExitWaiter {
    /// Blocks until the notifier is closed.
    pub fn wait(&self) {
        let Ok(mut closed) = self.signal.closed.lock() else {
            return;
        };
        while !*closed {
            closed = match self.signal.cond.wait(closed) {
                Ok(guard) => guard,
                Err(_) => return,
            };
        }
    }

    /// Blocks until the notifier is closed or `timeout` elapses.
    ///
    /// Returns `true` if the notifier was closed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Ok(closed) = self.signal.closed.lock() else {
            return false;
        };
        self.signal
            .cond
            .wait_timeout_while(closed, timeout, |closed| !*closed)
            .is_ok_and(|(closed, _)| *closed)
    }

    /// Returns `true` once the notifier has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.signal.closed.lock().is_ok_and(|closed| *closed)
    }
}

impl ExitNotifiers {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registered notifier for `id`, creating one if absent.
    pub fn get_or_create(&self, id: &str) -> Arc<ExitNotifier> {
        let Ok(mut entries) = self.table.lock() else {
            return Arc::new(self.detached(id));
        };
        Arc::clone(
            entries
                .entry(id.to_owned())
                .or_insert_with(|| Arc::new(self.detached(id))),
        )
    }

    /// Returns the registered notifier for `id`, if any.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<ExitNotifier>> {
        self.table.lock().ok()?.get(id).cloned()
    }

    /// Number of registered notifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().map_or(0, |entries| entries.len())
    }

    /// Returns `true` when no notifier is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn detached(&self, id: &str) -> ExitNotifier {
        ExitNotifier {
            id: id.to_owned(),
            registry: Arc::downgrade(&self.table),
            once: Once::new(),
            signal: Arc::new(Signal::default()),
        }
    }
}
