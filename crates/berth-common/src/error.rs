//! Unified error types for the Berth workspace.
//!
//! The variants follow the lifecycle taxonomy used by the daemon: problems
//! with the request itself surface before anything is allocated, while
//! runtime and I/O failures surface only after the rollback has run.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum BerthError {
    /// The request is malformed or not allowed in the current daemon mode.
    #[error("invalid request: {message}")]
    Validation {
        /// Description of the rejected request.
        message: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The target is in a lifecycle state that forbids the operation.
    #[error("conflict: {message}")]
    StateConflict {
        /// Description of the conflicting state.
        message: String,
    },

    /// A required resource was not found.
    #[error("no such {kind}: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// The runtime client already tracks a container with this ID.
    #[error("container {id} is already active")]
    AlreadyActive {
        /// Identifier of the tracked container.
        id: String,
    },

    /// The runtime shim failed to create the container process.
    #[error("{message}")]
    RuntimeCreate {
        /// Error description reported by the shim, possibly annotated.
        message: String,
        /// Exit status exposed to callers for this failure.
        exit_code: i32,
    },

    /// A shim RPC other than create failed.
    #[error("runtime shim error: {message}")]
    Shim {
        /// Error description reported by the shim.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// A mutex guarding shared state was poisoned by a panicking holder.
    #[error("lock poisoned: {what}")]
    LockPoisoned {
        /// The state the lock was guarding.
        what: &'static str,
    },
}

impl BerthError {
    /// Shorthand for a [`BerthError::Validation`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`BerthError::StateConflict`] error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::StateConflict {
            message: message.into(),
        }
    }

    /// Shorthand for a missing container.
    pub fn container_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "container",
            id: id.into(),
        }
    }

    /// Wraps an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the caller-visible exit status carried by this error, if any.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::RuntimeCreate { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Returns `true` if the error is a missing-resource error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BerthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_create_displays_bare_message() {
        let err = BerthError::RuntimeCreate {
            message: "oci runtime error: exec: \"/app\": permission denied".into(),
            exit_code: 126,
        };
        assert_eq!(
            err.to_string(),
            "oci runtime error: exec: \"/app\": permission denied"
        );
        assert_eq!(err.exit_code(), Some(126));
    }

    #[test]
    fn exit_code_is_absent_for_other_variants() {
        assert_eq!(BerthError::validation("bad").exit_code(), None);
        assert_eq!(BerthError::container_not_found("abc").exit_code(), None);
    }

    #[test]
    fn not_found_names_the_kind() {
        let err = BerthError::container_not_found("deadbeef");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "no such container: deadbeef");
    }
}
