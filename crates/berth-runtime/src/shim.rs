//! RPC seam to the runtime shim.
//!
//! The shim is the supervisor that actually creates container processes.
//! The client only needs two calls from it; transports implement
//! [`ShimApi`] and tests substitute in-process fakes.

use std::path::PathBuf;

use thiserror::Error;

/// Request to create (and start) a container's init process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateContainerRequest {
    /// Container ID.
    pub id: String,
    /// Bundle directory holding `config.json`.
    pub bundle_path: PathBuf,
    /// FIFO the init process reads stdin from.
    pub stdin: PathBuf,
    /// FIFO the init process writes stdout to.
    pub stdout: PathBuf,
    /// FIFO the init process writes stderr to.
    pub stderr: PathBuf,
    /// Checkpoint to restore from; empty for a fresh start.
    pub checkpoint: String,
    /// Directory holding checkpoints.
    pub checkpoint_dir: PathBuf,
    /// Runtime binary.
    pub runtime: String,
    /// Extra runtime arguments.
    pub runtime_args: Vec<String>,
    /// Ask the runtime not to use `pivot_root`.
    pub no_pivot_root: bool,
}

/// Result of a successful create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateContainerResponse {
    /// Host PID of the init process.
    pub pid: u32,
}

/// Request to deliver a signal to a process inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRequest {
    /// Container ID.
    pub id: String,
    /// Process name as known to the shim (`init` for the container's init).
    pub pid: String,
    /// Signal number.
    pub signal: u32,
}

/// Typed failure reasons newer shims attach to errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShimErrorKind {
    /// The executable or a path it needs does not exist.
    NotFound,
    /// The executable could not be invoked.
    PermissionDenied,
    /// A mount tried to put a file onto a directory or vice versa.
    NotADirectory,
}

/// Error returned by a shim RPC.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ShimError {
    /// Typed reason, when the shim provides one.
    pub kind: Option<ShimErrorKind>,
    /// Error description as reported by the shim.
    pub message: String,
}

impl ShimError {
    /// An untyped error carrying only a description.
    pub fn untyped(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message: message.into(),
        }
    }

    /// A typed error.
    pub fn typed(kind: ShimErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            message: message.into(),
        }
    }
}

/// Calls the runtime client makes on the shim.
pub trait ShimApi: Send + Sync {
    /// Creates and starts the container's init process.
    ///
    /// # Errors
    ///
    /// Returns the shim's error when the process cannot be created.
    fn create_container(
        &self,
        request: &CreateContainerRequest,
    ) -> Result<CreateContainerResponse, ShimError>;

    /// Delivers a signal to a process inside a container.
    ///
    /// # Errors
    ///
    /// Returns the shim's error when the signal cannot be delivered.
    fn signal(&self, request: &SignalRequest) -> Result<(), ShimError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_displays_shim_message() {
        let err = ShimError::typed(ShimErrorKind::NotFound, "exec: \"/app\": not found");
        assert_eq!(err.to_string(), "exec: \"/app\": not found");
        let source: &dyn std::error::Error = &err;
        assert!(source.source().is_none());
    }
}
