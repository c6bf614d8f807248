//! System-wide constants and default paths.

/// Default root for per-container data.
pub const DEFAULT_DATA_ROOT: &str = "/var/lib/berth";

/// Default state root of the runtime client; bundle directories live below it.
pub const DEFAULT_RUNTIME_STATE_DIR: &str = "/var/run/berth/runtime";

/// Directory under the data root holding one directory per container.
pub const CONTAINERS_DIR: &str = "containers";

/// File name of the persisted container record.
pub const CONTAINER_RECORD_FILE: &str = "config.v2.json";

/// File name of the persisted runtime spec inside a bundle directory.
pub const SPEC_FILE: &str = "config.json";

/// Directory under a container's root holding its checkpoints.
pub const CHECKPOINTS_DIR: &str = "checkpoints";

/// Name the shim uses to address a container's init process.
pub const INIT_PROCESS: &str = "init";

/// Mount point of the cgroups v2 unified hierarchy.
pub const CGROUP_V2_PATH: &str = "/sys/fs/cgroup";

/// Default network mode on Linux.
pub const DEFAULT_NETWORK_MODE: &str = "bridge";

/// Default runtime name.
pub const DEFAULT_RUNTIME: &str = "runc";

/// Default log driver.
pub const DEFAULT_LOG_DRIVER: &str = "json-file";

/// Log drivers the daemon knows how to configure.
pub const KNOWN_LOG_DRIVERS: &[&str] = &["json-file", "local", "journald", "syslog", "none"];

/// Default size of `/dev/shm` (64 MiB).
pub const DEFAULT_SHM_SIZE: i64 = 64 * 1024 * 1024;

/// Exit code recorded when a start fails without a more specific classification.
pub const EXIT_CODE_START_FAILED: i32 = 128;

/// Exit code for a command that could not be found (or a bad bind-mount type).
pub const EXIT_CODE_NOT_FOUND: i32 = 127;

/// Exit code for a command that could not be invoked.
pub const EXIT_CODE_NOT_EXECUTABLE: i32 = 126;

/// Application name used in log output and state files.
pub const APP_NAME: &str = "berth";
