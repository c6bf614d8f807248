//! Starting containers.
//!
//! [`Daemon::container_start`] validates a start request and hands off to
//! the start sequence, which runs under the container's lock from the
//! first check to the last rollback step. Once anything has been set up,
//! every failure goes through [`Daemon::cleanup`] before it is returned.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::{Arc, MutexGuard};
use std::time::{Duration, Instant};

use berth_common::error::{BerthError, Result};
use berth_common::types::{ContainerId, HostConfig, NetworkMode};
use berth_runtime::container::StdioPipes;
use berth_runtime::options::{CreateOption, NoPivotRootOption, RuntimeOption};

use crate::classify::classify_create_error;
use crate::collaborators::RemoveOptions;
use crate::container::{Container, ContainerRecord};
use crate::daemon::Daemon;
use crate::settings;
use crate::state::save_container;

/// Platforms where a host config may still be supplied at start time.
const LEGACY_HOST_CONFIG_SUPPORTED: bool = !cfg!(windows);

/// Result of a successful start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The container was started.
    Started,
    /// The container was already running; nothing was done.
    NotModified,
}

impl Daemon {
    /// Starts the container named by `reference`.
    ///
    /// `legacy_host_config` replaces the stored host configuration first;
    /// this is deprecated and rejected on platforms that never allowed it.
    /// `checkpoint_dir` defaults to the container's checkpoint directory.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a checkpoint outside experimental
    /// mode or invalid settings, [`BerthError::NotFound`] for an unknown
    /// reference, a conflict for a paused container, and otherwise the
    /// failure of the start sequence.
    pub fn container_start(
        &self,
        reference: &str,
        legacy_host_config: Option<HostConfig>,
        checkpoint: &str,
        checkpoint_dir: Option<&Path>,
    ) -> Result<StartOutcome> {
        if !checkpoint.is_empty() && !self.config.experimental {
            return Err(BerthError::validation(
                "checkpoint is only supported in experimental mode",
            ));
        }

        let container = self.containers.get(reference)?;
        {
            let mut record = container.lock()?;
            if record.state.paused {
                return Err(BerthError::conflict(
                    "cannot start a paused container, try unpause instead",
                ));
            }
            if record.state.running {
                return Ok(StartOutcome::NotModified);
            }

            if let Some(host_config) = legacy_host_config {
                self.apply_legacy_host_config(&container, &mut record, host_config)?;
            }

            settings::verify_container_settings(&record.host_config, &self.system)?;
            settings::adapt_container_settings(&mut record.host_config);
        }

        self.start_container(&container, checkpoint, checkpoint_dir, true)?;
        Ok(StartOutcome::Started)
    }

    /// Starts a container on behalf of another daemon subsystem.
    ///
    /// # Errors
    ///
    /// Returns the failure of the start sequence.
    pub fn start(&self, container: &Container) -> Result<()> {
        self.start_container(container, "", None, true)
    }

    /// Records the exit of a container's init process and decides whether
    /// its restart policy brings it back.
    ///
    /// Returns the delay after which [`Daemon::restart`] should be called.
    ///
    /// # Errors
    ///
    /// Returns an error if the container's lock is poisoned.
    pub fn handle_exit(
        &self,
        container: &Container,
        exit_code: i32,
        ran_for: Duration,
    ) -> Result<Option<Duration>> {
        let mut record = container.lock()?;
        record.state.set_stopped(exit_code);
        let manually_stopped = record.has_been_manually_stopped;
        let delay = record
            .restart_manager()
            .should_restart(exit_code, manually_stopped, ran_for);
        if delay.is_some() {
            record.restart_count = record.restart_manager().restart_count();
            record.state.restarting = true;
        } else {
            self.cleanup(container, &mut record);
        }
        if let Err(err) = save_container(container.root(), &record) {
            tracing::warn!(id = %container.id(), error = %err, "failed to persist exit state");
        }
        drop(record);
        tracing::info!(id = %container.id(), exit_code, restart = ?delay, "container exited");
        Ok(delay)
    }

    /// Restarts a container from the restart loop, keeping its restart
    /// counters.
    ///
    /// # Errors
    ///
    /// Returns the failure of the start sequence.
    pub fn restart(&self, container: &Container) -> Result<()> {
        self.start_container(container, "", None, false)
    }

    fn apply_legacy_host_config(
        &self,
        container: &Container,
        record: &mut ContainerRecord,
        mut host_config: HostConfig,
    ) -> Result<()> {
        if !LEGACY_HOST_CONFIG_SUPPORTED {
            return Err(BerthError::validation(
                "supplying a host config on start is not supported, it should be supplied on create",
            ));
        }
        tracing::warn!(
            id = %container.id(),
            "DEPRECATED: setting host configuration options when the container starts is deprecated"
        );

        let old_network_mode = record.host_config.network_mode.clone();
        settings::set_security_options(record, &host_config)?;
        settings::merge_and_verify_log_config(
            &mut host_config.log_config,
            &self.config.default_log_config,
        )?;
        if host_config.network_mode.is_blank() {
            host_config.network_mode = NetworkMode::platform_default();
        }
        record.host_config = host_config;

        if record.host_config.network_mode != old_network_mode {
            record.network_settings.networks.clear();
        }
        save_container(container.root(), record)?;
        settings::init_dns_host_config(&mut record.host_config);
        Ok(())
    }

    /// Runs the start sequence under the container's lock.
    fn start_container(
        &self,
        container: &Container,
        checkpoint: &str,
        checkpoint_dir: Option<&Path>,
        reset_restart_manager: bool,
    ) -> Result<()> {
        let started = Instant::now();
        let mut record = container.lock()?;

        if reset_restart_manager && record.state.running {
            return Ok(());
        }
        if record.state.removal_in_progress || record.state.dead {
            return Err(BerthError::conflict(
                "container is marked for removal and cannot be started",
            ));
        }

        match self.run_start_steps(
            container,
            &mut record,
            checkpoint,
            checkpoint_dir,
            reset_restart_manager,
        ) {
            Ok(()) => {
                drop(record);
                self.metrics.update_since("start", started);
                Ok(())
            }
            Err(err) => {
                match self.roll_back_start(container, record, &err) {
                    Ok(record) => drop(record),
                    Err(lock_err) => {
                        tracing::error!(id = %container.id(), error = %lock_err, "failed to reacquire container lock after rollback");
                    }
                }
                Err(err)
            }
        }
    }

    fn run_start_steps(
        &self,
        container: &Container,
        record: &mut ContainerRecord,
        checkpoint: &str,
        checkpoint_dir: Option<&Path>,
        reset_restart_manager: bool,
    ) -> Result<()> {
        if record.base_fs.is_none() {
            self.mounts.mount(record)?;
        }

        if record.host_config.network_mode.is_blank() {
            record.host_config.network_mode = NetworkMode::platform_default();
        }

        self.network.initialize(record)?;

        let spec = self.specs.build(container, record)?;

        let options = self.create_options(&record.host_config)?;

        if reset_restart_manager {
            record.reset_restart_manager(true);
        }

        let checkpoint_dir =
            checkpoint_dir.map_or_else(|| container.checkpoint_dir(), Path::to_path_buf);

        let stdio = OnceCell::new();
        let attach = |pipes: &StdioPipes| -> Result<()> {
            let _ = stdio.set(pipes.clone());
            Ok(())
        };

        let id = container.id().as_str();
        match self
            .runtime
            .create(id, checkpoint, &checkpoint_dir, &spec, &attach, &options)
        {
            Ok(pid) => {
                record.stdio = stdio.get().cloned();
                record.state.set_running(pid);
                record.has_been_started_before = true;
                record.has_been_manually_stopped = false;
                if let Err(err) = save_container(container.root(), record) {
                    tracing::warn!(id, error = %err, "failed to persist running state");
                }
                tracing::info!(id, pid, "container started");
                Ok(())
            }
            Err(err) => {
                let classified = classify_create_error(&err, &record.path);
                tracing::error!(id, error = %classified.message, "create container failed");
                if let Some(exit_code) = classified.exit_code {
                    record.state.exit_code = exit_code;
                }
                record.ensure_failure_exit_code();
                Err(BerthError::RuntimeCreate {
                    message: classified.message,
                    exit_code: record.state.exit_code,
                })
            }
        }
    }

    /// Undoes a failed start. Releases the container's lock while
    /// auto-removal is kicked off and returns it reacquired.
    fn roll_back_start<'a>(
        &self,
        container: &'a Container,
        mut record: MutexGuard<'a, ContainerRecord>,
        err: &BerthError,
    ) -> Result<MutexGuard<'a, ContainerRecord>> {
        record.state.set_error(err);
        record.ensure_failure_exit_code();
        if let Err(save_err) = save_container(container.root(), &record) {
            tracing::warn!(id = %container.id(), error = %save_err, "failed to persist failed start");
        }
        record.reset();

        self.cleanup(container, &mut record);

        if !record.host_config.auto_remove {
            return Ok(record);
        }
        drop(record);
        self.spawn_auto_remove(container.id().clone());
        container.lock()
    }

    fn spawn_auto_remove(&self, id: ContainerId) {
        let remover = Arc::clone(&self.remover);
        let options = RemoveOptions {
            force: true,
            remove_volumes: true,
        };
        let spawned = std::thread::Builder::new()
            .name(format!("auto-remove-{}", short_id(&id)))
            .spawn(move || {
                if let Err(err) = remover.remove(&id, options) {
                    tracing::error!(id = %id, error = %err, "can't remove container");
                }
            });
        if let Err(err) = spawned {
            tracing::error!(error = %err, "failed to spawn auto-remove thread");
        }
    }

    fn create_options(&self, host_config: &HostConfig) -> Result<Vec<Box<dyn CreateOption>>> {
        let name = host_config.runtime.as_str();
        let runtime = self.config.runtime(name).ok_or_else(|| BerthError::Config {
            message: format!("unknown runtime specified: {name}"),
        })?;
        let options: Vec<Box<dyn CreateOption>> = vec![
            Box::new(RuntimeOption {
                path: resolve_runtime_path(&runtime.path),
                args: runtime.runtime_args.clone(),
            }),
            Box::new(NoPivotRootOption(self.config.no_pivot_root)),
        ];
        Ok(options)
    }
}

/// Resolves a bare runtime name on `PATH`, leaving paths and unresolvable
/// names unchanged.
fn resolve_runtime_path(path: &str) -> String {
    if path.contains('/') {
        return path.to_owned();
    }
    which::which(path).map_or_else(
        |err| {
            tracing::debug!(runtime = path, error = %err, "runtime not found on PATH");
            path.to_owned()
        },
        |found: PathBuf| found.display().to_string(),
    )
}

fn short_id(id: &ContainerId) -> &str {
    let id = id.as_str();
    id.get(..12).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_not_resolved() {
        assert_eq!(resolve_runtime_path("/opt/runc"), "/opt/runc");
        assert_eq!(resolve_runtime_path("./runc"), "./runc");
    }

    #[test]
    fn unknown_bare_name_is_kept() {
        assert_eq!(
            resolve_runtime_path("berth-runtime-that-does-not-exist"),
            "berth-runtime-that-does-not-exist"
        );
    }

    #[test]
    fn short_id_truncates_long_ids() {
        assert_eq!(short_id(&ContainerId::new("0123456789abcdef")), "0123456789ab");
        assert_eq!(short_id(&ContainerId::new("abc")), "abc");
    }
}
