//! Domain primitive types used across the Berth workspace.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a container instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random 64-character hex container ID.
    #[must_use]
    pub fn generate() -> Self {
        let id = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        Self(id)
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ContainerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Network mode of a container (`bridge`, `host`, `none`, `container:<id>`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkMode(String);

impl NetworkMode {
    /// Creates a network mode from its textual form.
    #[must_use]
    pub fn new(mode: impl Into<String>) -> Self {
        Self(mode.into())
    }

    /// The platform default network mode.
    #[must_use]
    pub fn platform_default() -> Self {
        Self(crate::constants::DEFAULT_NETWORK_MODE.to_owned())
    }

    /// Returns `true` when no mode has been set.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` for the host network stack.
    #[must_use]
    pub fn is_host(&self) -> bool {
        self.0 == "host"
    }

    /// Returns `true` when the container joins another container's stack.
    #[must_use]
    pub fn is_container(&self) -> bool {
        self.0.starts_with("container:")
    }

    /// Returns the textual form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Restart policy for a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartPolicy {
    /// Policy name: `no`, `always`, `on-failure`, or `unless-stopped`.
    pub name: String,
    /// Retry limit; only meaningful for `on-failure`.
    pub maximum_retry_count: i64,
}

impl RestartPolicy {
    /// Returns `true` when the policy never restarts the container.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.name.is_empty() || self.name == "no"
    }

    /// Returns `true` for the `on-failure` policy.
    #[must_use]
    pub fn is_on_failure(&self) -> bool {
        self.name == "on-failure"
    }
}

/// Log driver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log driver name; empty means the daemon default.
    #[serde(rename = "type")]
    pub driver: String,
    /// Driver-specific options.
    pub config: BTreeMap<String, String>,
}

/// Resource limits for a container.
///
/// Zero means "unset" for every field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    /// CPU shares (relative weight).
    pub cpu_shares: i64,
    /// CPU CFS quota in microseconds.
    pub cpu_quota: i64,
    /// CPU CFS period in microseconds.
    pub cpu_period: i64,
    /// Memory limit in bytes.
    pub memory: i64,
    /// Block I/O weight (10-1000).
    pub blkio_weight: u16,
    /// Maximum number of pids.
    pub pids_limit: i64,
}

/// Per-container runtime policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Network mode.
    pub network_mode: NetworkMode,
    /// Restart policy.
    pub restart_policy: RestartPolicy,
    /// Remove the container automatically when it exits or fails to start.
    pub auto_remove: bool,
    /// Bind mounts in `host:container[:opts]` form.
    pub binds: Vec<String>,
    /// Links to other containers in `name:alias` form.
    pub links: Vec<String>,
    /// Resource limits.
    pub resources: Resources,
    /// Security options (`label=...`, `apparmor=...`, `seccomp=...`, `no-new-privileges`).
    pub security_opt: Vec<String>,
    /// Log driver configuration.
    pub log_config: LogConfig,
    /// DNS servers.
    pub dns: Option<Vec<String>>,
    /// DNS search domains.
    pub dns_search: Option<Vec<String>>,
    /// DNS resolver options.
    pub dns_options: Option<Vec<String>>,
    /// Size of `/dev/shm` in bytes.
    pub shm_size: i64,
    /// Run the container with extended privileges.
    pub privileged: bool,
    /// Runtime name; empty selects the daemon default.
    pub runtime: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_64_hex_chars() {
        let id = ContainerId::generate();
        assert_eq!(id.as_str().len(), 64);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, ContainerId::generate());
    }

    #[test]
    fn blank_network_mode() {
        assert!(NetworkMode::default().is_blank());
        assert!(!NetworkMode::platform_default().is_blank());
        assert!(NetworkMode::new("container:abc").is_container());
    }

    #[test]
    fn restart_policy_none_variants() {
        assert!(RestartPolicy::default().is_none());
        let always = RestartPolicy {
            name: "always".into(),
            maximum_retry_count: 0,
        };
        assert!(!always.is_none());
    }

    #[test]
    fn host_config_deserializes_with_defaults() {
        let hc: HostConfig =
            serde_json::from_str(r#"{"auto_remove":true,"log_config":{"type":"json-file"}}"#)
                .expect("parse");
        assert!(hc.auto_remove);
        assert_eq!(hc.log_config.driver, "json-file");
        assert!(hc.network_mode.is_blank());
        assert!(hc.dns.is_none());
    }
}
