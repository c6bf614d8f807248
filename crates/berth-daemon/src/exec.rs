//! Registry of exec sessions.
//!
//! Each container keeps its own store, and the daemon keeps a second,
//! daemon-wide store; a session is registered in both and unregistered
//! from both.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use berth_common::types::ContainerId;

/// An exec session started inside a running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecConfig {
    /// Session ID.
    pub id: String,
    /// Container the session runs in.
    pub container_id: ContainerId,
    /// Executable.
    pub entrypoint: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Whether a terminal is attached.
    pub tty: bool,
}

impl ExecConfig {
    /// Creates a session with a random ID.
    #[must_use]
    pub fn new(container_id: ContainerId, entrypoint: &str, args: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            container_id,
            entrypoint: entrypoint.to_owned(),
            args,
            tty: false,
        }
    }
}

/// A set of exec sessions keyed by session ID.
#[derive(Debug, Default)]
pub struct ExecStore {
    commands: RwLock<HashMap<String, Arc<ExecConfig>>>,
}

impl ExecStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session.
    pub fn add(&self, config: Arc<ExecConfig>) {
        if let Ok(mut commands) = self.commands.write() {
            let _ = commands.insert(config.id.clone(), config);
        }
    }

    /// Looks up a session.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<ExecConfig>> {
        self.commands.read().ok()?.get(id).cloned()
    }

    /// Unregisters a session.
    pub fn delete(&self, id: &str) {
        if let Ok(mut commands) = self.commands.write() {
            let _ = commands.remove(id);
        }
    }

    /// Returns a snapshot of every registered session.
    #[must_use]
    pub fn commands(&self) -> Vec<Arc<ExecConfig>> {
        self.commands
            .read()
            .map(|commands| commands.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.read().map_or(0, |commands| commands.len())
    }

    /// Returns `true` when no session is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
