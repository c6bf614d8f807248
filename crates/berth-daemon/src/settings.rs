//! Host configuration validation, adaptation, and legacy merges.

use berth_common::constants::{DEFAULT_SHM_SIZE, KNOWN_LOG_DRIVERS};
use berth_common::error::{BerthError, Result};
use berth_common::types::{HostConfig, LogConfig};

use crate::collaborators::SystemInfo;
use crate::container::ContainerRecord;

const RESTART_POLICIES: &[&str] = &["", "no", "always", "unless-stopped", "on-failure"];
const SECURITY_OPT_KEYS: &[&str] = &["label", "apparmor", "seccomp"];
const BLKIO_WEIGHT_RANGE: std::ops::RangeInclusive<u16> = 10..=1000;
const CPU_PERIOD_RANGE: std::ops::RangeInclusive<i64> = 1000..=1_000_000;
const UNCONFINED: &str = "unconfined";

/// Checks that the host can honour `host_config`.
///
/// # Errors
///
/// Returns a validation error naming the first setting the host cannot
/// honour or that is out of range.
pub fn verify_container_settings(host_config: &HostConfig, system: &SystemInfo) -> Result<()> {
    let resources = &host_config.resources;

    if resources.memory < 0 {
        return Err(BerthError::validation("memory limit cannot be negative"));
    }
    if resources.memory > 0 && !system.memory {
        return Err(BerthError::validation(
            "the kernel does not support memory limits or the cgroup is not mounted",
        ));
    }
    let wants_cpu = resources.cpu_shares > 0 || resources.cpu_quota > 0 || resources.cpu_period > 0;
    if wants_cpu && !system.cpu {
        return Err(BerthError::validation(
            "the kernel does not support CPU limits or the cgroup is not mounted",
        ));
    }
    if resources.cpu_period != 0 && !CPU_PERIOD_RANGE.contains(&resources.cpu_period) {
        return Err(BerthError::validation(
            "CPU period must be between 1ms and 1s",
        ));
    }
    if resources.pids_limit > 0 && !system.pids {
        return Err(BerthError::validation(
            "the kernel does not support pids limits or the cgroup is not mounted",
        ));
    }
    if resources.blkio_weight != 0 {
        if !BLKIO_WEIGHT_RANGE.contains(&resources.blkio_weight) {
            return Err(BerthError::validation(
                "range of blkio weight is from 10 to 1000",
            ));
        }
        if !system.io {
            return Err(BerthError::validation(
                "the kernel does not support block I/O weight or the cgroup is not mounted",
            ));
        }
    }

    let policy = &host_config.restart_policy;
    if !RESTART_POLICIES.contains(&policy.name.as_str()) {
        return Err(BerthError::validation(format!(
            "invalid restart policy '{}'",
            policy.name
        )));
    }
    if policy.maximum_retry_count < 0 {
        return Err(BerthError::validation(
            "maximum retry count cannot be negative",
        ));
    }
    if policy.maximum_retry_count != 0 && !policy.is_on_failure() {
        return Err(BerthError::validation(format!(
            "maximum retry count cannot be used with restart policy '{}'",
            policy.name
        )));
    }
    if host_config.auto_remove && !policy.is_none() {
        return Err(BerthError::validation(
            "can't create 'auto_remove' container with restart policy",
        ));
    }
    Ok(())
}

/// Brings settings written by older daemons up to date.
pub fn adapt_container_settings(host_config: &mut HostConfig) {
    if host_config.shm_size == 0 {
        host_config.shm_size = DEFAULT_SHM_SIZE;
    }
    for opt in &mut host_config.security_opt {
        if opt.contains('=') {
            continue;
        }
        if let Some((key, value)) = opt.split_once(':') {
            if SECURITY_OPT_KEYS.contains(&key) {
                *opt = format!("{key}={value}");
            }
        }
    }
}

/// Resolves `host_config.security_opt` into the container's security settings.
///
/// Accepts both `key=value` and the older `key:value` separators.
///
/// # Errors
///
/// Returns a validation error for an unknown or malformed option.
pub fn set_security_options(record: &mut ContainerRecord, host_config: &HostConfig) -> Result<()> {
    let security = &mut record.security;
    let mut label = Vec::new();

    for opt in &host_config.security_opt {
        if opt == "no-new-privileges" {
            security.no_new_privileges = true;
            continue;
        }
        let (key, value) = opt
            .split_once('=')
            .or_else(|| opt.split_once(':'))
            .ok_or_else(|| invalid_security_opt(opt))?;
        match key {
            "label" if value == "disable" => label.clear(),
            "label" => label.push(value.to_owned()),
            "apparmor" => security.apparmor_profile = value.to_owned(),
            "seccomp" => security.seccomp_profile = value.to_owned(),
            "no-new-privileges" => {
                security.no_new_privileges = value
                    .parse()
                    .map_err(|_| invalid_security_opt(opt))?;
            }
            _ => return Err(invalid_security_opt(opt)),
        }
    }

    security.process_label = label.join(",");
    if host_config.privileged {
        if security.apparmor_profile.is_empty() {
            security.apparmor_profile = UNCONFINED.to_owned();
        }
        if security.seccomp_profile.is_empty() {
            security.seccomp_profile = UNCONFINED.to_owned();
        }
    }
    Ok(())
}

fn invalid_security_opt(opt: &str) -> BerthError {
    BerthError::validation(format!("invalid security option: {opt}"))
}

/// Fills unset log settings from the daemon defaults and checks the driver.
///
/// Default options are merged only when the container uses the default
/// driver; options the container sets win.
///
/// # Errors
///
/// Returns a validation error for an unknown driver.
pub fn merge_and_verify_log_config(config: &mut LogConfig, defaults: &LogConfig) -> Result<()> {
    if config.driver.is_empty() {
        config.driver.clone_from(&defaults.driver);
    }
    if config.driver == defaults.driver {
        for (key, value) in &defaults.config {
            let _ = config
                .config
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
    if !KNOWN_LOG_DRIVERS.contains(&config.driver.as_str()) {
        return Err(BerthError::validation(format!(
            "unknown log driver: {}",
            config.driver
        )));
    }
    Ok(())
}

/// Normalises unset DNS settings to empty lists.
pub fn init_dns_host_config(host_config: &mut HostConfig) {
    let _ = host_config.dns.get_or_insert_with(Vec::new);
    let _ = host_config.dns_search.get_or_insert_with(Vec::new);
    let _ = host_config.dns_options.get_or_insert_with(Vec::new);
}
