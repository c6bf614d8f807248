//! The daemon: container registry plus the subsystems lifecycle operations drive.

use std::sync::Arc;

use berth_common::config::DaemonConfig;
use berth_common::error::{BerthError, Result};
use berth_runtime::client::ContainerRuntime;

use crate::collaborators::{
    ContainerRemover, LayerStore, MountManager, NetworkController, SpecBuilder, SystemInfo,
    VolumeManager,
};
use crate::container::{Container, ContainerRecord};
use crate::exec::{ExecConfig, ExecStore};
use crate::metrics::ActionMetrics;
use crate::state;
use crate::store::ContainerStore;

/// Subsystems the daemon delegates to.
pub struct DaemonParts {
    /// Runtime client.
    pub runtime: Arc<dyn ContainerRuntime>,
    /// Network endpoint allocation.
    pub network: Arc<dyn NetworkController>,
    /// Root filesystem and auxiliary mounts.
    pub mounts: Arc<dyn MountManager>,
    /// Layer store lookups.
    pub layers: Arc<dyn LayerStore>,
    /// Volume unmounting.
    pub volumes: Arc<dyn VolumeManager>,
    /// Runtime spec construction.
    pub specs: Arc<dyn SpecBuilder>,
    /// Container removal.
    pub remover: Arc<dyn ContainerRemover>,
}

/// Container lifecycle manager.
pub struct Daemon {
    pub(crate) config: DaemonConfig,
    pub(crate) system: SystemInfo,
    pub(crate) containers: ContainerStore,
    pub(crate) exec_commands: ExecStore,
    pub(crate) metrics: ActionMetrics,
    pub(crate) runtime: Arc<dyn ContainerRuntime>,
    pub(crate) network: Arc<dyn NetworkController>,
    pub(crate) mounts: Arc<dyn MountManager>,
    pub(crate) layers: Arc<dyn LayerStore>,
    pub(crate) volumes: Arc<dyn VolumeManager>,
    pub(crate) specs: Arc<dyn SpecBuilder>,
    pub(crate) remover: Arc<dyn ContainerRemover>,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("config", &self.config)
            .field("system", &self.system)
            .field("containers", &self.containers.len())
            .finish_non_exhaustive()
    }
}

impl Daemon {
    /// Creates a daemon with an empty registry.
    #[must_use]
    pub fn new(config: DaemonConfig, system: SystemInfo, parts: DaemonParts) -> Self {
        Self {
            config,
            system,
            containers: ContainerStore::new(),
            exec_commands: ExecStore::new(),
            metrics: ActionMetrics::new(),
            runtime: parts.runtime,
            network: parts.network,
            mounts: parts.mounts,
            layers: parts.layers,
            volumes: parts.volumes,
            specs: parts.specs,
            remover: parts.remover,
        }
    }

    /// Daemon configuration.
    #[must_use]
    pub const fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Lifecycle action metrics.
    #[must_use]
    pub const fn metrics(&self) -> &ActionMetrics {
        &self.metrics
    }

    /// Daemon-wide exec sessions.
    #[must_use]
    pub const fn exec_commands(&self) -> &ExecStore {
        &self.exec_commands
    }

    /// Registers a container and persists its record under the data root.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    pub fn register(&self, record: ContainerRecord) -> Result<Arc<Container>> {
        let root = self.config.containers_dir().join(record.id.as_str());
        state::save_container(&root, &record)?;
        let container = Arc::new(Container::new(root, record));
        self.containers.add(Arc::clone(&container))?;
        tracing::info!(id = %container.id(), name = container.name(), "container registered");
        Ok(container)
    }

    /// Resolves a container by ID, name, or unique ID prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if no single container matches.
    pub fn get_container(&self, reference: &str) -> Result<Arc<Container>> {
        self.containers.get(reference)
    }

    /// Unregisters a container from the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn forget(&self, id: &str) -> Result<Option<Arc<Container>>> {
        self.containers.remove(id)
    }

    /// Registers an exec session with its container and the daemon.
    pub fn register_exec(&self, container: &Container, exec: ExecConfig) -> Arc<ExecConfig> {
        let exec = Arc::new(exec);
        container.exec_commands.add(Arc::clone(&exec));
        self.exec_commands.add(Arc::clone(&exec));
        exec
    }

    /// Unregisters an exec session from its container and the daemon.
    pub fn unregister_exec(&self, container: &Container, exec_id: &str) {
        container.exec_commands.delete(exec_id);
        self.exec_commands.delete(exec_id);
    }

    /// Sends `signal` to the init process of a running container.
    ///
    /// Holds the container's lock for the duration of the call.
    ///
    /// # Errors
    ///
    /// Returns an error if the container does not exist, is not running,
    /// or the signal cannot be delivered.
    pub fn container_kill(&self, reference: &str, signal: i32) -> Result<()> {
        let container = self.containers.get(reference)?;
        let record = container.lock()?;
        if !record.state.running {
            return Err(BerthError::conflict(format!(
                "container {} is not running",
                container.id()
            )));
        }
        self.runtime.signal(container.id().as_str(), signal)?;
        tracing::info!(id = %container.id(), signal, "container signalled");
        drop(record);
        Ok(())
    }
}
