//! In-memory handle for a container tracked by the runtime client.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use berth_common::error::{BerthError, Result};
use nix::sys::stat::Mode;

use crate::shim::{CreateContainerRequest, ShimApi};

/// FIFO paths connecting the daemon to the init process's stdio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdioPipes {
    /// Init process stdin.
    pub stdin: PathBuf,
    /// Init process stdout.
    pub stdout: PathBuf,
    /// Init process stderr.
    pub stderr: PathBuf,
}

/// Hands the stdio FIFOs to the daemon before the process starts.
pub type StdioCallback<'a> = &'a dyn Fn(&StdioPipes) -> Result<()>;

/// A container the runtime client has created or is creating.
#[derive(Debug, Clone)]
pub struct RuntimeContainer {
    /// Container ID.
    pub id: String,
    /// Bundle directory.
    pub dir: PathBuf,
    /// Runtime binary; empty lets the shim choose.
    pub runtime: String,
    /// Extra runtime arguments.
    pub runtime_args: Vec<String>,
    /// Ask the runtime not to use `pivot_root`.
    pub no_pivot_root: bool,
    /// Host PID of the init process once started.
    pub pid: Option<u32>,
}

impl RuntimeContainer {
    /// Creates a handle for `id` whose bundle lives at `dir`.
    #[must_use]
    pub fn new(id: impl Into<String>, dir: PathBuf) -> Self {
        Self {
            id: id.into(),
            dir,
            runtime: String::new(),
            runtime_args: Vec::new(),
            no_pivot_root: false,
            pid: None,
        }
    }

    /// Returns the stdio FIFO paths inside the bundle directory.
    #[must_use]
    pub fn stdio_pipes(&self) -> StdioPipes {
        StdioPipes {
            stdin: self.dir.join("init-stdin"),
            stdout: self.dir.join("init-stdout"),
            stderr: self.dir.join("init-stderr"),
        }
    }

    /// Removes the bundle directory. A missing directory is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn clean(&self) -> Result<()> {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BerthError::io(&self.dir, e)),
        }
    }

    /// Creates the stdio FIFOs, hands them to `attach`, and asks the shim
    /// to create the init process.
    ///
    /// # Errors
    ///
    /// Returns an error if a FIFO cannot be created, `attach` fails, or
    /// the shim rejects the request.
    pub fn start(
        &mut self,
        shim: &dyn ShimApi,
        checkpoint: &str,
        checkpoint_dir: &Path,
        attach: StdioCallback<'_>,
    ) -> crate::error::Result<()> {
        let pipes = self.stdio_pipes();
        for fifo in [&pipes.stdin, &pipes.stdout, &pipes.stderr] {
            make_fifo(fifo)?;
        }
        attach(&pipes)?;

        let request = CreateContainerRequest {
            id: self.id.clone(),
            bundle_path: self.dir.clone(),
            stdin: pipes.stdin,
            stdout: pipes.stdout,
            stderr: pipes.stderr,
            checkpoint: checkpoint.to_owned(),
            checkpoint_dir: checkpoint_dir.to_path_buf(),
            runtime: self.runtime.clone(),
            runtime_args: self.runtime_args.clone(),
            no_pivot_root: self.no_pivot_root,
        };
        let response = shim.create_container(&request)?;
        self.pid = Some(response.pid);
        tracing::info!(id = %self.id, pid = response.pid, "container process created");
        Ok(())
    }
}

fn make_fifo(path: &Path) -> Result<()> {
    match nix::unistd::mkfifo(path, Mode::S_IRWXU) {
        Ok(()) | Err(nix::errno::Errno::EEXIST) => Ok(()),
        Err(errno) => Err(BerthError::io(path, errno.into())),
    }
}
