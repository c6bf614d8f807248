//! OCI-compatible runtime spec document.
//!
//! Only the parts of the runtime-spec the daemon fills in are modelled.
//! The document is built fresh for every start attempt and persisted
//! verbatim into the bundle directory.

use serde::{Deserialize, Serialize};

/// OCI runtime spec version written into every document.
pub const OCI_VERSION: &str = "1.0.2";

/// Top-level runtime spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSpec {
    /// Spec version.
    pub oci_version: String,
    /// The container's init process.
    pub process: Process,
    /// Root filesystem.
    pub root: Root,
    /// Container hostname.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    /// Mounts in the order they are applied.
    #[serde(default)]
    pub mounts: Vec<Mount>,
    /// Lifecycle hooks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<Hooks>,
    /// Linux-specific configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux: Option<Linux>,
}

/// Process description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    /// Allocate a pseudo-terminal.
    #[serde(default)]
    pub terminal: bool,
    /// User the process runs as.
    pub user: User,
    /// Command line.
    pub args: Vec<String>,
    /// Environment in `KEY=value` form.
    #[serde(default)]
    pub env: Vec<String>,
    /// Working directory.
    pub cwd: String,
    /// Capability names granted to the process.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Forbid privilege escalation.
    #[serde(default)]
    pub no_new_privileges: bool,
    /// `AppArmor` profile.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub apparmor_profile: String,
    /// SELinux process label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub selinux_label: String,
}

/// Numeric identity of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID inside the container.
    pub uid: u32,
    /// Group ID inside the container.
    pub gid: u32,
}

/// Root filesystem of the container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    /// Path to the root filesystem on the host.
    pub path: String,
    /// Mount the root read-only.
    #[serde(default)]
    pub readonly: bool,
}

/// A mount applied inside the container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    /// Destination inside the container.
    pub destination: String,
    /// Filesystem type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Source device or host path.
    pub source: String,
    /// Mount options.
    #[serde(default)]
    pub options: Vec<String>,
}

/// Lifecycle hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hooks {
    /// Run after the namespaces are created, before the user process starts.
    #[serde(default)]
    pub prestart: Vec<Hook>,
    /// Run after the user process starts.
    #[serde(default)]
    pub poststart: Vec<Hook>,
    /// Run after the container is deleted.
    #[serde(default)]
    pub poststop: Vec<Hook>,
}

/// An external executable invoked at a lifecycle point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    /// Absolute path to the executable.
    pub path: String,
    /// Arguments, including `argv[0]`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment in `KEY=value` form.
    #[serde(default)]
    pub env: Vec<String>,
    /// Timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

/// Linux-specific configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Linux {
    /// Resource limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<LinuxResources>,
    /// Namespaces the container is placed in.
    #[serde(default)]
    pub namespaces: Vec<Namespace>,
    /// User-namespace UID mappings.
    #[serde(default, rename = "uidMappings")]
    pub uid_mappings: Vec<IdMapping>,
    /// User-namespace GID mappings.
    #[serde(default, rename = "gidMappings")]
    pub gid_mappings: Vec<IdMapping>,
}

impl Linux {
    /// Returns `true` if the container gets its own user namespace.
    #[must_use]
    pub fn has_user_namespace(&self) -> bool {
        self.namespaces
            .iter()
            .any(|ns| ns.kind == NamespaceKind::User)
    }
}

/// Resource limits in runtime-spec form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxResources {
    /// CPU controller settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<LinuxCpu>,
    /// Memory controller settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<LinuxMemory>,
    /// Block I/O controller settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_io: Option<LinuxBlockIo>,
    /// Pids controller settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pids: Option<LinuxPids>,
}

/// CPU limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxCpu {
    /// Relative weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<u64>,
    /// CFS quota in microseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<i64>,
    /// CFS period in microseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<u64>,
}

/// Memory limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxMemory {
    /// Hard limit in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// Block I/O limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxBlockIo {
    /// Relative weight (10-1000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u16>,
}

/// Pids limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxPids {
    /// Maximum number of pids.
    pub limit: i64,
}

/// A namespace the container is placed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Namespace type.
    #[serde(rename = "type")]
    pub kind: NamespaceKind,
    /// Existing namespace to join; empty creates a new one.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// Namespace types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    /// Process IDs.
    Pid,
    /// Network stack.
    Network,
    /// Mount table.
    Mount,
    /// System V IPC.
    Ipc,
    /// Hostname.
    Uts,
    /// User and group IDs.
    User,
    /// Cgroup root.
    Cgroup,
}

/// Maps a range of container IDs onto host IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdMapping {
    /// First ID inside the container.
    #[serde(rename = "containerID")]
    pub container_id: u32,
    /// First ID on the host.
    #[serde(rename = "hostID")]
    pub host_id: u32,
    /// Length of the range.
    pub size: u32,
}

/// Translates a container ID to the host ID it maps to.
///
/// IDs outside every mapping are returned unchanged.
#[must_use]
pub fn host_id_from_map(id: u32, mappings: &[IdMapping]) -> u32 {
    mappings
        .iter()
        .find(|m| id >= m.container_id && id - m.container_id < m.size)
        .map_or(id, |m| m.host_id + (id - m.container_id))
}
