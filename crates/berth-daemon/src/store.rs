//! In-memory registry of the daemon's containers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use berth_common::error::{BerthError, Result};

use crate::container::Container;

/// Containers known to the daemon, keyed by ID.
///
/// The registry has its own lock for membership only; a container's state
/// is guarded by the container's lock.
#[derive(Debug, Default)]
pub struct ContainerStore {
    containers: RwLock<HashMap<String, Arc<Container>>>,
}

impl ContainerStore {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a container, replacing any previous entry with the same ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn add(&self, container: Arc<Container>) -> Result<()> {
        let mut containers = self.containers.write().map_err(|_| poisoned())?;
        let _ = containers.insert(container.id().as_str().to_owned(), container);
        Ok(())
    }

    /// Unregisters a container.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn remove(&self, id: &str) -> Result<Option<Arc<Container>>> {
        let mut containers = self.containers.write().map_err(|_| poisoned())?;
        Ok(containers.remove(id))
    }

    /// Number of registered containers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.read().map_or(0, |c| c.len())
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves a reference by full ID, exact name, or unique ID prefix,
    /// in that order.
    ///
    /// Names are matched with or without their leading `/`.
    ///
    /// # Errors
    ///
    /// Returns [`BerthError::NotFound`] if nothing matches, or a validation
    /// error if the prefix matches more than one container.
    pub fn get(&self, reference: &str) -> Result<Arc<Container>> {
        if reference.is_empty() {
            return Err(BerthError::validation("container name or ID cannot be empty"));
        }
        let containers = self.containers.read().map_err(|_| poisoned())?;

        if let Some(container) = containers.get(reference) {
            return Ok(Arc::clone(container));
        }

        let name = reference.trim_start_matches('/');
        if let Some(container) = containers
            .values()
            .find(|c| c.name().trim_start_matches('/') == name)
        {
            return Ok(Arc::clone(container));
        }

        let mut found = containers
            .iter()
            .filter(|(id, _)| id.starts_with(reference))
            .map(|(_, c)| c);
        match (found.next(), found.next()) {
            (Some(container), None) => Ok(Arc::clone(container)),
            (Some(_), Some(_)) => Err(BerthError::validation(format!(
                "multiple IDs found with provided prefix: {reference}"
            ))),
            (None, _) => Err(BerthError::container_not_found(reference)),
        }
    }
}

const fn poisoned() -> BerthError {
    BerthError::LockPoisoned {
        what: "container store",
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use berth_common::types::ContainerId;

    use super::*;
    use crate::container::ContainerRecord;

    fn container(id: &str, name: &str) -> Arc<Container> {
        let record = ContainerRecord::new(ContainerId::new(id), name, "/app", vec![]);
        Arc::new(Container::new(PathBuf::from("/tmp").join(id), record))
    }

    fn store() -> ContainerStore {
        let store = ContainerStore::new();
        store.add(container("abc123", "web")).unwrap();
        store.add(container("abd456", "db")).unwrap();
        store
    }

    #[test]
    fn resolves_by_id_name_and_prefix() {
        let store = store();
        assert_eq!(store.get("abc123").unwrap().id().as_str(), "abc123");
        assert_eq!(store.get("db").unwrap().id().as_str(), "abd456");
        assert_eq!(store.get("/web").unwrap().id().as_str(), "abc123");
        assert_eq!(store.get("abd").unwrap().id().as_str(), "abd456");
    }

    #[test]
    fn ambiguous_prefix_is_rejected() {
        let err = store().get("ab").unwrap_err();
        assert!(matches!(err, BerthError::Validation { .. }));
    }

    #[test]
    fn unknown_reference_is_not_found() {
        let err = store().get("zzz").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn remove_unregisters() {
        let store = store();
        assert!(store.remove("abc123").unwrap().is_some());
        assert_eq!(store.len(), 1);
        assert!(store.get("web").is_err());
    }
}
