//! Per-ID lock table.
//!
//! Serializes operations on a single container ID while letting distinct
//! IDs proceed in parallel. Entries are created on first use and dropped
//! once the last holder or waiter lets go, so the table only ever holds
//! IDs with work in flight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use berth_common::error::{BerthError, Result};

#[derive(Debug, Default)]
struct Entry {
    held: Mutex<bool>,
    released: Condvar,
    /// Holders plus waiters; guarded by the table lock.
    users: AtomicUsize,
}

/// A table of mutexes keyed by container ID.
#[derive(Debug, Default)]
pub struct Locker {
    entries: Mutex<HashMap<String, Arc<Entry>>>,
}

/// Holds the lock for one ID until dropped.
#[derive(Debug)]
#[must_use = "the ID is unlocked as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    locker: &'a Locker,
    id: String,
    entry: Arc<Entry>,
}

impl Locker {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock for `id` is acquired.
    ///
    /// # Errors
    ///
    /// Returns an error if the table's bookkeeping mutex is poisoned.
    pub fn lock(&self, id: &str) -> Result<LockGuard<'_>> {
        let entry = {
            let mut entries = self.table()?;
            let entry = Arc::clone(entries.entry(id.to_owned()).or_default());
            let _ = entry.users.fetch_add(1, Ordering::SeqCst);
            entry
        };

        if let Err(err) = acquire(&entry) {
            self.leave(id, &entry);
            return Err(err);
        }

        Ok(LockGuard {
            locker: self,
            id: id.to_owned(),
            entry,
        })
    }

    /// Returns the number of IDs that currently have a holder or waiter.
    #[must_use]
    pub fn active(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    fn table(&self) -> Result<MutexGuard<'_, HashMap<String, Arc<Entry>>>> {
        self.entries.lock().map_err(|_| poisoned())
    }

    fn release(&self, id: &str, entry: &Arc<Entry>) {
        if let Ok(mut held) = entry.held.lock() {
            *held = false;
        }
        entry.released.notify_one();
        self.leave(id, entry);
    }

    /// Drops one holder or waiter, removing the entry after the last.
    fn leave(&self, id: &str, entry: &Arc<Entry>) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entry.users.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = entries.remove(id);
        }
    }
}

fn acquire(entry: &Entry) -> Result<()> {
    let mut held = entry.held.lock().map_err(|_| poisoned())?;
    while *held {
        held = entry.released.wait(held).map_err(|_| poisoned())?;
    }
    *held = true;
    Ok(())
}

impl LockGuard<'_> {
    /// The ID this guard holds.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.locker.release(&self.id, &self.entry);
    }
}

const fn poisoned() -> BerthError {
    BerthError::LockPoisoned { what: "id locker" }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn same_id_is_serialized() {
        let locker = Arc::new(Locker::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locker = Arc::clone(&locker);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    let _guard = locker.lock("c1").unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    let _ = max_seen.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    let _ = inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locker.active(), 0);
    }

    #[test]
    fn distinct_ids_do_not_block_each_other() {
        let locker = Locker::new();
        let a = locker.lock("a").unwrap();
        let b = locker.lock("b").unwrap();
        assert_eq!(locker.active(), 2);
        assert_eq!(a.id(), "a");
        drop(a);
        drop(b);
        assert_eq!(locker.active(), 0);
    }

    #[test]
    fn lock_can_be_reacquired_after_release() {
        let locker = Locker::new();
        drop(locker.lock("x").unwrap());
        let _again = locker.lock("x").unwrap();
        assert_eq!(locker.active(), 1);
    }

    #[test]
    fn failed_wait_does_not_leak_the_entry() {
        let locker = Locker::new();
        let guard = locker.lock("p").unwrap();
        let entry = Arc::clone(&guard.entry);
        let poisoner = thread::spawn(move || {
            let _held = entry.held.lock().unwrap();
            panic!("poison the entry");
        });
        assert!(poisoner.join().is_err());

        assert!(matches!(
            locker.lock("p"),
            Err(BerthError::LockPoisoned { .. })
        ));
        assert_eq!(guard.entry.users.load(Ordering::SeqCst), 1);
        drop(guard);
        assert_eq!(locker.active(), 0);
    }
}
