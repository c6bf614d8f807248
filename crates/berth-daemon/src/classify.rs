//! Maps runtime create failures to caller-visible exit codes.

use berth_common::constants::{EXIT_CODE_NOT_EXECUTABLE, EXIT_CODE_NOT_FOUND};
use berth_runtime::error::RuntimeError;
use berth_runtime::shim::ShimErrorKind;
use nix::errno::Errno;

const MOUNT_TYPE_HINT: &str = ": Are you trying to mount a directory onto a file (or vice-versa)? \
Check if the specified host path exists and is the expected type";

const NOT_FOUND_TEXTS: &[&str] = &[
    "executable file not found",
    "no such file or directory",
    "system cannot find the file specified",
];

/// A create failure with its exit code, if one applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// Error description, possibly with a remediation hint appended.
    pub message: String,
    /// Exit code for the container, or `None` for an unclassified failure.
    pub exit_code: Option<i32>,
}

/// Classifies a create failure for a container whose entrypoint is `entrypoint`.
///
/// A typed shim error decides directly. Otherwise the description is
/// matched case-insensitively: a missing entrypoint gives 127, a
/// permission error 126, and a not-a-directory error 127. Rules are
/// checked in that order and a later match overrides an earlier one; a
/// not-a-directory error also gets the mount-type hint.
#[must_use]
pub fn classify_create_error(err: &RuntimeError, entrypoint: &str) -> Classified {
    let mut message = err.to_string();

    if let Some(kind) = err.as_shim().and_then(|shim| shim.kind) {
        let exit_code = match kind {
            ShimErrorKind::NotFound => EXIT_CODE_NOT_FOUND,
            ShimErrorKind::PermissionDenied => EXIT_CODE_NOT_EXECUTABLE,
            ShimErrorKind::NotADirectory => {
                message.push_str(MOUNT_TYPE_HINT);
                EXIT_CODE_NOT_FOUND
            }
        };
        return Classified {
            message,
            exit_code: Some(exit_code),
        };
    }

    let lower = message.to_lowercase();
    let contains = |needle: &str| lower.contains(&needle.to_lowercase());

    let entrypoint_missing = !entrypoint.is_empty()
        && contains(entrypoint)
        && NOT_FOUND_TEXTS.iter().any(|text| contains(text));
    let permission_denied = contains(Errno::EACCES.desc());
    let not_a_directory = contains(Errno::ENOTDIR.desc());

    let mut exit_code = None;
    if entrypoint_missing {
        exit_code = Some(EXIT_CODE_NOT_FOUND);
    }
    if permission_denied {
        exit_code = Some(EXIT_CODE_NOT_EXECUTABLE);
    }
    if not_a_directory {
        exit_code = Some(EXIT_CODE_NOT_FOUND);
        message.push_str(MOUNT_TYPE_HINT);
    }

    Classified { message, exit_code }
}

#[cfg(test)]
mod tests {
    use berth_common::error::BerthError;
    use berth_runtime::shim::ShimError;

    use super::*;

    fn untyped(message: &str) -> RuntimeError {
        RuntimeError::Shim(ShimError::untyped(message))
    }

    #[test]
    fn missing_entrypoint_is_127() {
        let err = untyped(
            "oci runtime error: container_linux.go:262: exec: \"/APP/run\": stat /app/run: No such file or directory",
        );
        let classified = classify_create_error(&err, "/app/run");
        assert_eq!(classified.exit_code, Some(127));
        assert!(!classified.message.contains("mount a directory"));
    }

    #[test]
    fn not_found_for_another_path_is_unclassified() {
        let err = untyped("stat /etc/missing: no such file or directory");
        assert_eq!(classify_create_error(&err, "/app/run").exit_code, None);
    }

    #[test]
    fn permission_denied_is_126() {
        let err = untyped("exec: \"/app/run\": Permission denied");
        assert_eq!(classify_create_error(&err, "/app/run").exit_code, Some(126));
    }

    #[test]
    fn not_a_directory_adds_hint() {
        let err = untyped("rootfs_linux.go:53: mounting \"/etc/x\" to rootfs: not a directory");
        let classified = classify_create_error(&err, "/app/run");
        assert_eq!(classified.exit_code, Some(127));
        assert!(classified.message.ends_with("is the expected type"));
    }

    #[test]
    fn mount_type_overrides_permission_denied() {
        let err = untyped("permission denied; not a directory");
        let classified = classify_create_error(&err, "/app/run");
        assert_eq!(classified.exit_code, Some(127));
        assert!(classified.message.contains("mount a directory onto a file"));
    }

    #[test]
    fn permission_denied_overrides_missing_entrypoint() {
        let err = untyped(
            "exec: \"/app/run\": permission denied; stat /app/run: no such file or directory",
        );
        let classified = classify_create_error(&err, "/app/run");
        assert_eq!(classified.exit_code, Some(126));
        assert!(!classified.message.contains("mount a directory"));
    }

    #[test]
    fn typed_errors_skip_text_matching() {
        let err = RuntimeError::Shim(ShimError::typed(
            ShimErrorKind::PermissionDenied,
            "exec format error",
        ));
        assert_eq!(classify_create_error(&err, "/app/run").exit_code, Some(126));

        let err = RuntimeError::Shim(ShimError::typed(ShimErrorKind::NotADirectory, "mount"));
        let classified = classify_create_error(&err, "");
        assert_eq!(classified.exit_code, Some(127));
        assert!(classified.message.starts_with("mount: Are you"));
    }

    #[test]
    fn local_failures_are_unclassified() {
        let err = RuntimeError::Local(BerthError::validation("bad"));
        assert_eq!(classify_create_error(&err, "/app").exit_code, None);
    }
}
