//! Error type for runtime client operations.

use berth_common::error::BerthError;
use thiserror::Error;

use crate::shim::ShimError;

/// Errors returned by [`crate::client::Client`].
///
/// Shim failures are kept apart from local failures so callers can
/// classify them by their typed reason.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A local failure: bookkeeping, bundle preparation, or persistence.
    #[error(transparent)]
    Local(#[from] BerthError),

    /// The shim rejected the request.
    #[error("{0}")]
    Shim(#[from] ShimError),
}

impl RuntimeError {
    /// Returns the shim error, if this is one.
    #[must_use]
    pub const fn as_shim(&self) -> Option<&ShimError> {
        match self {
            Self::Shim(e) => Some(e),
            Self::Local(_) => None,
        }
    }
}

impl From<RuntimeError> for BerthError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Local(e) => e,
            RuntimeError::Shim(e) => Self::Shim { message: e.message },
        }
    }
}

/// Result alias for runtime client operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shim_errors_flatten_to_shim_variant() {
        let err: BerthError = RuntimeError::Shim(ShimError::untyped("ttrpc: closed")).into();
        assert_eq!(err.to_string(), "runtime shim error: ttrpc: closed");
    }

    #[test]
    fn local_errors_pass_through() {
        let err: BerthError = RuntimeError::Local(BerthError::container_not_found("c1")).into();
        assert!(err.is_not_found());
    }
}
