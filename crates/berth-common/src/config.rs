//! Daemon configuration model.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BerthError, Result};
use crate::types::LogConfig;

/// Root configuration for the Berth daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Base directory for per-container data and records.
    pub data_root: PathBuf,
    /// State root of the runtime client; bundle directories live below it.
    pub runtime_state_dir: PathBuf,
    /// Whether experimental features (checkpoint/restore) are enabled.
    pub experimental: bool,
    /// Runtime used when a container does not name one.
    pub default_runtime: String,
    /// Runtimes available to containers, keyed by name.
    pub runtimes: BTreeMap<String, RuntimeConfig>,
    /// Ask the runtime not to use `pivot_root`.
    pub no_pivot_root: bool,
    /// Daemon-wide log driver defaults merged into container log configs.
    pub default_log_config: LogConfig,
    /// Daemon logging output.
    pub log: LogSettings,
}

/// A runtime binary and the extra arguments it is invoked with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Absolute path or `PATH`-resolvable binary name.
    pub path: String,
    /// Arguments passed to every runtime invocation.
    pub runtime_args: Vec<String>,
}

/// Daemon logging output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let mut runtimes = BTreeMap::new();
        let _ = runtimes.insert(
            crate::constants::DEFAULT_RUNTIME.to_owned(),
            RuntimeConfig {
                path: crate::constants::DEFAULT_RUNTIME.to_owned(),
                runtime_args: Vec::new(),
            },
        );
        Self {
            data_root: PathBuf::from(crate::constants::DEFAULT_DATA_ROOT),
            runtime_state_dir: PathBuf::from(crate::constants::DEFAULT_RUNTIME_STATE_DIR),
            experimental: false,
            default_runtime: crate::constants::DEFAULT_RUNTIME.to_owned(),
            runtimes,
            no_pivot_root: false,
            default_log_config: LogConfig {
                driver: crate::constants::DEFAULT_LOG_DRIVER.to_owned(),
                config: BTreeMap::new(),
            },
            log: LogSettings::default(),
        }
    }
}

impl DaemonConfig {
    /// Loads the configuration from a JSON file.
    ///
    /// Fields missing from the file keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BerthError::io(path, e))?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Directory holding one subdirectory per container.
    #[must_use]
    pub fn containers_dir(&self) -> PathBuf {
        self.data_root.join(crate::constants::CONTAINERS_DIR)
    }

    /// Looks up a runtime by name, falling back to the default runtime for an empty name.
    #[must_use]
    pub fn runtime(&self, name: &str) -> Option<&RuntimeConfig> {
        let name = if name.is_empty() {
            self.default_runtime.as_str()
        } else {
            name
        };
        self.runtimes.get(name)
    }
}
