//! Logging bootstrap.

use berth_common::config::LogSettings;
use berth_common::error::{BerthError, Result};
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `settings.level`.
///
/// # Errors
///
/// Returns a configuration error if the filter directive is invalid or a
/// global subscriber is already installed.
pub fn init(settings: &LogSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| BerthError::Config {
            message: format!("invalid log filter '{}': {e}", settings.level),
        })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| BerthError::Config {
        message: format!("failed to install log subscriber: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_an_error() {
        let settings = LogSettings::default();
        let _ = init(&settings);
        let err = init(&settings).unwrap_err();
        assert!(matches!(err, BerthError::Config { .. }));
    }
}
