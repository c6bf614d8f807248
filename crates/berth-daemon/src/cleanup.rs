//! Teardown of everything a start attempt may have set up.

use crate::collaborators::VolumeEvent;
use crate::container::{Container, ContainerRecord};
use crate::daemon::Daemon;

impl Daemon {
    /// Releases the container's network resources, mounts, exec sessions,
    /// and attached streams.
    ///
    /// Every step runs even if an earlier one failed; failures are logged.
    /// Safe to call more than once.
    pub fn cleanup(&self, container: &Container, record: &mut ContainerRecord) {
        let id = container.id();
        let had_base_fs = record.base_fs.is_some();

        self.network.release(record);

        self.mounts.unmount_ipc_mounts(record);

        if let Err(err) = self.mounts.unmount(record) {
            tracing::warn!(id = %id, error = %err, "failed to unmount root filesystem, unmounting by mount ID");
            match self.layers.mount_id(id) {
                Ok(mount_id) => {
                    if let Err(err) = self.mounts.cleanup_mounts_by_id(&mount_id) {
                        tracing::warn!(id = %id, mount_id, error = %err, "failed to clean up mounts");
                    }
                }
                Err(err) => tracing::warn!(id = %id, error = %err, "failed to look up mount ID"),
            }
        }

        if let Err(err) = self.mounts.unmount_secrets(record) {
            tracing::warn!(id = %id, error = %err, "cleanup: failed to unmount secrets");
        }

        for exec in container.exec_commands.commands() {
            self.unregister_exec(container, &exec.id);
        }

        if had_base_fs {
            if let Err(err) = self.volumes.unmount_volumes(record, &log_volume_event) {
                tracing::warn!(id = %id, error = %err, "cleanup: failed to unmount volumes");
            }
        }

        container.attach.cancel();
        tracing::debug!(id = %id, "cleanup complete");
    }
}

#[allow(clippy::needless_pass_by_value)]
fn log_volume_event(event: VolumeEvent) {
    tracing::info!(volume = %event.volume, action = event.action, "volume event");
}
