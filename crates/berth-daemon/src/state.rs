//! Persistent container records.
//!
//! Each container's record lives in `<root>/config.v2.json`. Writes go to
//! a temporary file in the same directory and are renamed into place, so
//! a reader never sees a partially written record.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use berth_common::constants::CONTAINER_RECORD_FILE;
use berth_common::error::{BerthError, Result};

use crate::container::ContainerRecord;

/// Persists `record` to `root` atomically.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot
/// be written or renamed.
pub fn save_container(root: &Path, record: &ContainerRecord) -> Result<()> {
    fs::create_dir_all(root).map_err(|e| BerthError::io(root, e))?;

    let target = root.join(CONTAINER_RECORD_FILE);
    let tmp = root.join(format!(".{CONTAINER_RECORD_FILE}.tmp"));

    let file = File::create(&tmp).map_err(|e| BerthError::io(&tmp, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, record)?;
    writer.flush().map_err(|e| BerthError::io(&tmp, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| BerthError::io(&tmp, e))?;

    fs::rename(&tmp, &target).map_err(|e| BerthError::io(&target, e))?;
    tracing::debug!(id = %record.id, path = %target.display(), "container record saved");
    Ok(())
}

/// Loads the record persisted in `root`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_container(root: &Path) -> Result<ContainerRecord> {
    let path = root.join(CONTAINER_RECORD_FILE);
    let content = fs::read_to_string(&path).map_err(|e| BerthError::io(&path, e))?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use berth_common::types::ContainerId;

    use super::*;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("abc");
        let mut record = ContainerRecord::new(ContainerId::new("abc"), "web", "/app", vec![]);
        record.state.exit_code = 127;

        save_container(&root, &record).unwrap();
        let loaded = load_container(&root).unwrap();

        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.state.exit_code, 127);
        assert!(!root.join(".config.v2.json.tmp").exists());
    }

    #[test]
    fn save_replaces_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = ContainerRecord::new(ContainerId::new("abc"), "web", "/app", vec![]);
        save_container(dir.path(), &record).unwrap();
        record.restart_count = 3;
        save_container(dir.path(), &record).unwrap();
        assert_eq!(load_container(dir.path()).unwrap().restart_count, 3);
    }

    #[test]
    fn missing_record_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_container(dir.path()).unwrap_err();
        assert!(matches!(err, BerthError::Io { .. }));
    }

    #[test]
    fn corrupt_record_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONTAINER_RECORD_FILE), "{not json").unwrap();
        let err = load_container(dir.path()).unwrap_err();
        assert!(matches!(err, BerthError::Serialization { .. }));
    }
}
