//! Runtime client: bundle preparation and delegation to the shim.
//!
//! The client keeps its own per-ID lock, independent of the daemon's
//! container lock. It is held only around the create and signal calls.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use berth_common::constants::{INIT_PROCESS, SPEC_FILE};
use berth_common::error::BerthError;
use berth_common::spec::{RuntimeSpec, host_id_from_map};

use crate::bundle;
use crate::container::{RuntimeContainer, StdioCallback};
use crate::error::Result;
use crate::locker::Locker;
use crate::notifier::{ExitNotifiers, ExitWaiter};
use crate::options::{self, CreateOption};
use crate::shim::{ShimApi, SignalRequest};

/// Lifecycle calls the daemon makes on the runtime layer.
pub trait ContainerRuntime: Send + Sync {
    /// Prepares the bundle for `id`, persists `spec`, and starts the init
    /// process through the shim. Returns the host PID of the init process.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is already active, the bundle cannot be
    /// prepared, or the shim rejects the request. On error no bundle
    /// directory is left behind and `id` is not tracked.
    fn create(
        &self,
        id: &str,
        checkpoint: &str,
        checkpoint_dir: &Path,
        spec: &RuntimeSpec,
        attach: StdioCallback<'_>,
        options: &[Box<dyn CreateOption>],
    ) -> Result<u32>;

    /// Sends `signal` to the init process of `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the shim cannot deliver the signal.
    fn signal(&self, id: &str, signal: i32) -> Result<()>;
}

/// Containers tracked by the client, keyed by ID.
#[derive(Debug, Default)]
struct ContainerTable {
    entries: RwLock<HashMap<String, RuntimeContainer>>,
}

impl ContainerTable {
    fn get(&self, id: &str) -> Result<Option<RuntimeContainer>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(id).cloned())
    }

    fn insert(&self, container: RuntimeContainer) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let _ = entries.insert(container.id.clone(), container);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<Option<RuntimeContainer>> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        Ok(entries.remove(id))
    }
}

/// Client for one runtime shim.
pub struct Client {
    state_dir: PathBuf,
    shim: Arc<dyn ShimApi>,
    locker: Locker,
    containers: ContainerTable,
    exit_notifiers: ExitNotifiers,
}

impl Client {
    /// Creates a client whose bundles live under `state_dir`.
    #[must_use]
    pub fn new(state_dir: PathBuf, shim: Arc<dyn ShimApi>) -> Self {
        Self {
            state_dir,
            shim,
            locker: Locker::new(),
            containers: ContainerTable::default(),
            exit_notifiers: ExitNotifiers::new(),
        }
    }

    /// The state root bundles are derived from.
    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Returns the tracked handle for `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not tracked.
    pub fn get(&self, id: &str) -> Result<RuntimeContainer> {
        self.containers
            .get(id)?
            .ok_or_else(|| BerthError::container_not_found(id).into())
    }

    /// Returns `true` if `id` is tracked.
    #[must_use]
    pub fn is_active(&self, id: &str) -> bool {
        matches!(self.containers.get(id), Ok(Some(_)))
    }

    /// Returns a waiter that fires when the tracked container `id` exits.
    #[must_use]
    pub fn exit_waiter(&self, id: &str) -> Option<ExitWaiter> {
        self.exit_notifiers.get(id).map(|n| n.wait())
    }

    /// Records that the init process of `id` has exited: stops tracking
    /// it, removes its bundle, and wakes every exit waiter.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock table or the tracking table is poisoned.
    pub fn process_exited(&self, id: &str) -> Result<()> {
        let _guard = self.locker.lock(id)?;
        if let Some(container) = self.containers.delete(id)? {
            if let Err(e) = container.clean() {
                tracing::warn!(id, error = %e, "failed to remove bundle after exit");
            }
        }
        if let Some(notifier) = self.exit_notifiers.get(id) {
            notifier.close();
        }
        tracing::debug!(id, "container exited");
        Ok(())
    }

    fn new_container(
        &self,
        dir: PathBuf,
        id: &str,
        options: &[Box<dyn CreateOption>],
    ) -> RuntimeContainer {
        let mut container = RuntimeContainer::new(id, dir);
        let failures = options::apply_all(&mut container, options);
        if !failures.is_empty() {
            let summary = failures
                .iter()
                .map(|f| format!("{}: {}", f.option, f.error))
                .collect::<Vec<_>>()
                .join("; ");
            tracing::warn!(id, failures = %summary, "create options failed to apply");
        }
        container
    }

    #[allow(clippy::too_many_arguments)]
    fn prepare_and_start(
        &self,
        container: &mut RuntimeContainer,
        uid: u32,
        gid: u32,
        checkpoint: &str,
        checkpoint_dir: &Path,
        spec: &RuntimeSpec,
        attach: StdioCallback<'_>,
    ) -> Result<()> {
        bundle::mkdir_all_as(&container.dir, uid, gid)?;
        write_spec(&container.dir.join(SPEC_FILE), spec)?;
        container.start(self.shim.as_ref(), checkpoint, checkpoint_dir, attach)
    }
}

impl ContainerRuntime for Client {
    fn create(
        &self,
        id: &str,
        checkpoint: &str,
        checkpoint_dir: &Path,
        spec: &RuntimeSpec,
        attach: StdioCallback<'_>,
        options: &[Box<dyn CreateOption>],
    ) -> Result<u32> {
        let _guard = self.locker.lock(id)?;

        if self.containers.get(id)?.is_some() {
            return Err(BerthError::AlreadyActive { id: id.to_owned() }.into());
        }

        let (uid, gid) = root_ids(spec);
        let dir = bundle::prepare_bundle_dir(&self.state_dir, uid, gid)?;
        let mut container = self.new_container(dir.join(id), id, options);
        container.clean()?;

        let started = self.prepare_and_start(
            &mut container,
            uid,
            gid,
            checkpoint,
            checkpoint_dir,
            spec,
            attach,
        );
        if let Err(e) = started {
            if let Err(clean_err) = container.clean() {
                tracing::warn!(id, error = %clean_err, "failed to remove bundle after failed create");
            }
            return Err(e);
        }

        let pid = container.pid.unwrap_or_default();
        self.containers.insert(container)?;
        let _ = self.exit_notifiers.get_or_create(id);
        Ok(pid)
    }

    fn signal(&self, id: &str, signal: i32) -> Result<()> {
        let _guard = self.locker.lock(id)?;
        let signal = u32::try_from(signal)
            .map_err(|_| BerthError::validation(format!("invalid signal number {signal}")))?;
        self.shim.signal(&SignalRequest {
            id: id.to_owned(),
            pid: INIT_PROCESS.to_owned(),
            signal,
        })?;
        tracing::debug!(id, signal, "signal delivered");
        Ok(())
    }
}

/// Host identity that owns the bundle for `spec`.
///
/// Without a user namespace the bundle belongs to root. With one, the
/// process user is translated through the namespace's ID mappings.
fn root_ids(spec: &RuntimeSpec) -> (u32, u32) {
    match &spec.linux {
        Some(linux) if linux.has_user_namespace() => (
            host_id_from_map(spec.process.user.uid, &linux.uid_mappings),
            host_id_from_map(spec.process.user.gid, &linux.gid_mappings),
        ),
        _ => (0, 0),
    }
}

/// Persists the spec as the bundle's `config.json`.
///
/// The file is written in place; a crash mid-write leaves it truncated
/// until the next create for the same ID cleans the bundle.
fn write_spec(path: &Path, spec: &RuntimeSpec) -> berth_common::error::Result<()> {
    let file = File::create(path).map_err(|e| BerthError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, spec)?;
    writer.flush().map_err(|e| BerthError::io(path, e))?;
    Ok(())
}

const fn poisoned() -> BerthError {
    BerthError::LockPoisoned {
        what: "runtime container table",
    }
}
