//! Daemon-side container model.
//!
//! A [`Container`] pairs an immutable identity with a [`ContainerRecord`]
//! behind the container's own mutex. Every lifecycle operation on one
//! container holds that mutex for its whole duration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Mutex, MutexGuard};

use berth_common::constants::{CHECKPOINTS_DIR, EXIT_CODE_START_FAILED};
use berth_common::error::{BerthError, Result};
use berth_common::types::{ContainerId, HostConfig};
use berth_runtime::container::StdioPipes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exec::ExecStore;
use crate::restart::RestartManager;

/// Lifecycle flags and the outcome of the last run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    /// The init process is running.
    pub running: bool,
    /// The container's processes are frozen.
    pub paused: bool,
    /// The restart manager is bringing the container back up.
    pub restarting: bool,
    /// A removal has been requested and is underway.
    pub removal_in_progress: bool,
    /// Removal failed half-way; the container can only be removed.
    pub dead: bool,
    /// Host PID of the init process while running.
    pub pid: Option<u32>,
    /// Exit status of the last run, or the classified start failure.
    pub exit_code: i32,
    /// Error from the last failed start.
    pub error: String,
    /// When the last run started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the last run finished.
    pub finished_at: Option<DateTime<Utc>>,
}

impl State {
    /// Marks the container running with the given init PID.
    pub fn set_running(&mut self, pid: u32) {
        self.running = true;
        self.paused = false;
        self.restarting = false;
        self.pid = Some(pid);
        self.exit_code = 0;
        self.error.clear();
        self.started_at = Some(Utc::now());
    }

    /// Marks the container stopped with the given exit status.
    pub fn set_stopped(&mut self, exit_code: i32) {
        self.running = false;
        self.paused = false;
        self.restarting = false;
        self.pid = None;
        self.exit_code = exit_code;
        self.finished_at = Some(Utc::now());
    }

    /// Records a start failure.
    pub fn set_error(&mut self, err: &BerthError) {
        self.error = err.to_string();
    }
}

/// Endpoint attached to one network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    /// Endpoint ID allocated by the network controller.
    pub endpoint_id: String,
    /// Assigned address.
    pub ip_address: String,
}

/// Networks the container is attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Endpoints keyed by network name.
    pub networks: BTreeMap<String, EndpointSettings>,
    /// Sandbox (network namespace) key.
    pub sandbox_key: String,
}

/// Process-level configuration chosen at create time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Image reference the container was created from.
    pub image: String,
    /// Environment in `KEY=value` form.
    pub env: Vec<String>,
    /// User the process runs as.
    pub user: String,
    /// Working directory.
    pub working_dir: String,
    /// Hostname.
    pub hostname: String,
    /// Allocate a pseudo-terminal.
    pub tty: bool,
}

/// Security settings resolved from `security_opt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// SELinux process label.
    pub process_label: String,
    /// `AppArmor` profile.
    pub apparmor_profile: String,
    /// Seccomp profile path or `unconfined`.
    pub seccomp_profile: String,
    /// Forbid privilege escalation.
    pub no_new_privileges: bool,
}

/// Everything the daemon knows and persists about a container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerRecord {
    /// Container ID.
    pub id: ContainerId,
    /// Name, with a leading `/`.
    pub name: String,
    /// Entrypoint executable.
    pub path: String,
    /// Entrypoint arguments.
    pub args: Vec<String>,
    /// Process configuration.
    pub config: ContainerConfig,
    /// Runtime policy.
    pub host_config: HostConfig,
    /// Lifecycle state.
    pub state: State,
    /// Attached networks.
    pub network_settings: NetworkSettings,
    /// Security settings.
    pub security: SecuritySettings,
    /// Mounted root filesystem, while mounted.
    pub base_fs: Option<PathBuf>,
    /// Restarts performed under the current policy.
    pub restart_count: u64,
    /// The container has been started at least once.
    pub has_been_started_before: bool,
    /// The last stop was requested by a user.
    pub has_been_manually_stopped: bool,
    /// Secrets are mounted into the container.
    pub secrets_mounted: bool,
    #[serde(skip)]
    restart_manager: Option<RestartManager>,
    /// Stdio FIFOs of the running init process.
    #[serde(skip)]
    pub stdio: Option<StdioPipes>,
}

impl ContainerRecord {
    /// Creates a record for a freshly created container.
    #[must_use]
    pub fn new(id: ContainerId, name: &str, path: &str, args: Vec<String>) -> Self {
        let name = if name.starts_with('/') {
            name.to_owned()
        } else {
            format!("/{name}")
        };
        Self {
            id,
            name,
            path: path.to_owned(),
            args,
            ..Self::default()
        }
    }

    /// Forces a non-zero exit code so a failed start never looks successful.
    pub const fn ensure_failure_exit_code(&mut self) {
        if self.state.exit_code == 0 {
            self.state.exit_code = EXIT_CODE_START_FAILED;
        }
    }

    /// Drops the runtime state of the last attempt so the container can
    /// be started again.
    pub fn reset(&mut self) {
        self.stdio = None;
        self.state.pid = None;
    }

    /// Cancels the current restart manager and, if `reset_count`, the
    /// restart counter.
    pub fn reset_restart_manager(&mut self, reset_count: bool) {
        if let Some(manager) = self.restart_manager.take() {
            manager.cancel();
        }
        if reset_count {
            self.restart_count = 0;
        }
    }

    /// Returns the restart manager for the current policy, creating it on
    /// first use.
    pub fn restart_manager(&mut self) -> &mut RestartManager {
        let policy = self.host_config.restart_policy.clone();
        let count = self.restart_count;
        self.restart_manager
            .get_or_insert_with(|| RestartManager::new(policy, count))
    }
}

/// Broadcasts cancellation to everyone attached to a container's streams.
#[derive(Debug, Default)]
pub struct AttachContext {
    subscribers: Mutex<Vec<SyncSender<()>>>,
}

impl AttachContext {
    /// Returns a receiver that disconnects when the context is cancelled.
    pub fn subscribe(&self) -> Receiver<()> {
        let (tx, rx) = mpsc::sync_channel(0);
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    /// Disconnects every subscriber.
    pub fn cancel(&self) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.clear();
        }
    }
}

/// A container tracked by the daemon.
#[derive(Debug)]
pub struct Container {
    id: ContainerId,
    name: String,
    root: PathBuf,
    record: Mutex<ContainerRecord>,
    /// Exec sessions running in this container.
    pub exec_commands: ExecStore,
    /// Attach and log streams waiting on this container.
    pub attach: AttachContext,
}

impl Container {
    /// Wraps a record whose on-disk state lives in `root`.
    #[must_use]
    pub fn new(root: PathBuf, record: ContainerRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            root,
            record: Mutex::new(record),
            exec_commands: ExecStore::new(),
            attach: AttachContext::default(),
        }
    }

    /// Container ID.
    #[must_use]
    pub const fn id(&self) -> &ContainerId {
        &self.id
    }

    /// Name, with a leading `/`. Readable without taking the lock.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the container's persisted state.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Default checkpoint directory.
    #[must_use]
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.root.join(CHECKPOINTS_DIR)
    }

    /// Acquires the container's exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns an error if a previous holder panicked.
    pub fn lock(&self) -> Result<MutexGuard<'_, ContainerRecord>> {
        self.record
            .lock()
            .map_err(|_| BerthError::LockPoisoned { what: "container" })
    }
}
