//! Seams to the subsystems the start path drives but does not own.
//!
//! Networking, storage, volumes, spec construction, and removal are
//! implemented elsewhere in the daemon; the start and cleanup code only
//! sees these traits.

use std::path::Path;

use berth_common::constants::CGROUP_V2_PATH;
use berth_common::error::Result;
use berth_common::spec::RuntimeSpec;
use berth_common::types::ContainerId;

use crate::container::{Container, ContainerRecord};

/// Allocates and releases network endpoints.
pub trait NetworkController: Send + Sync {
    /// Allocates endpoints and resolves links for the container.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint cannot be allocated.
    fn initialize(&self, record: &mut ContainerRecord) -> Result<()>;

    /// Releases endpoints and inter-container link rules. Never fails.
    fn release(&self, record: &mut ContainerRecord);
}

/// Mounts and unmounts a container's filesystems.
pub trait MountManager: Send + Sync {
    /// Mounts the root filesystem and records it in `record.base_fs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage driver cannot mount the layer.
    fn mount(&self, record: &mut ContainerRecord) -> Result<()>;

    /// Unmounts the root filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage driver cannot unmount the layer.
    fn unmount(&self, record: &mut ContainerRecord) -> Result<()>;

    /// Force-unmounts everything belonging to a storage mount ID.
    ///
    /// # Errors
    ///
    /// Returns an error if a mount cannot be removed.
    fn cleanup_mounts_by_id(&self, mount_id: &str) -> Result<()>;

    /// Unmounts the IPC mounts (`/dev/shm`, `/dev/mqueue`). Never fails.
    fn unmount_ipc_mounts(&self, record: &ContainerRecord);

    /// Unmounts the secrets tmpfs.
    ///
    /// # Errors
    ///
    /// Returns an error if the tmpfs cannot be unmounted.
    fn unmount_secrets(&self, record: &mut ContainerRecord) -> Result<()>;
}

/// Read access to the layer store.
pub trait LayerStore: Send + Sync {
    /// Returns the storage mount ID of the container's read-write layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the container has no read-write layer.
    fn mount_id(&self, id: &ContainerId) -> Result<String>;
}

/// A volume lifecycle event reported while unmounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeEvent {
    /// Volume name.
    pub volume: String,
    /// Action taken, such as `unmount`.
    pub action: &'static str,
}

/// Unmounts volumes attached to a container.
pub trait VolumeManager: Send + Sync {
    /// Unmounts every volume of the container, reporting each to `events`.
    ///
    /// # Errors
    ///
    /// Returns the first unmount failure.
    fn unmount_volumes(
        &self,
        record: &ContainerRecord,
        events: &dyn Fn(VolumeEvent),
    ) -> Result<()>;
}

/// Builds the runtime spec for one start attempt.
pub trait SpecBuilder: Send + Sync {
    /// Builds a fresh spec from the container's current configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be expressed as a spec.
    fn build(&self, container: &Container, record: &ContainerRecord) -> Result<RuntimeSpec>;
}

/// Options for removing a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Kill the container if it is running.
    pub force: bool,
    /// Remove anonymous volumes as well.
    pub remove_volumes: bool,
}

/// Removes containers.
pub trait ContainerRemover: Send + Sync {
    /// Removes the container `id`.
    ///
    /// Takes the container's lock; callers must not hold it.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be removed.
    fn remove(&self, id: &ContainerId, options: RemoveOptions) -> Result<()>;
}

/// Cgroup controllers available on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct SystemInfo {
    /// `memory` controller.
    pub memory: bool,
    /// `cpu` controller.
    pub cpu: bool,
    /// `io` controller (block I/O weight).
    pub io: bool,
    /// `pids` controller.
    pub pids: bool,
}

impl SystemInfo {
    /// A host with every controller available.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            memory: true,
            cpu: true,
            io: true,
            pids: true,
        }
    }

    /// Reads the controllers enabled at the cgroup v2 root.
    ///
    /// A host without a unified hierarchy reports no controllers.
    #[must_use]
    pub fn detect() -> Self {
        Self::from_root(Path::new(CGROUP_V2_PATH))
    }

    /// Reads `cgroup.controllers` under `root`.
    #[must_use]
    pub fn from_root(root: &Path) -> Self {
        let path = root.join("cgroup.controllers");
        let controllers = std::fs::read_to_string(&path).unwrap_or_else(|e| {
            tracing::debug!(path = %path.display(), error = %e, "cgroup controllers unavailable");
            String::new()
        });
        let has = |name: &str| controllers.split_whitespace().any(|c| c == name);
        Self {
            memory: has("memory"),
            cpu: has("cpu"),
            io: has("io"),
            pids: has("pids"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controllers_parsed_from_root() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("cgroup.controllers"), "cpuset cpu pids\n").unwrap();
        let info = SystemInfo::from_root(root.path());
        assert!(info.cpu);
        assert!(info.pids);
        assert!(!info.memory);
        assert!(!info.io);
    }

    #[test]
    fn missing_hierarchy_reports_nothing() {
        let root = tempfile::tempdir().unwrap();
        let info = SystemInfo::from_root(root.path());
        assert_eq!(
            info,
            SystemInfo {
                memory: false,
                cpu: false,
                io: false,
                pids: false,
            }
        );
    }
}
