//! Bundle directory preparation.
//!
//! Bundles for containers whose root maps to a non-root host user live
//! under a `<segment>.<uid>.<gid>` sibling of the shared state root, so
//! the remapped user can traverse its own tree without the shared
//! directories being chowned or opened up.

use std::fs::DirBuilder;
use std::io::ErrorKind;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};

use berth_common::error::{BerthError, Result};
use nix::unistd::{Gid, Uid, chown};

const BUNDLE_DIR_MODE: u32 = 0o700;

/// Returns the directory bundles for `uid`/`gid` are created under.
///
/// Root (`0`/`0`) always uses `state_root` unchanged. For any other
/// owner, each path segment that is missing or not traversable by
/// others is replaced by a `<segment>.<uid>.<gid>` sibling owned by that
/// user, and the walk continues below the sibling.
///
/// # Errors
///
/// Returns an error if `state_root` cannot be made absolute, a segment
/// cannot be inspected, or a sibling cannot be created or chowned.
pub fn prepare_bundle_dir(state_root: &Path, uid: u32, gid: u32) -> Result<PathBuf> {
    let root = std::path::absolute(state_root).map_err(|e| BerthError::io(state_root, e))?;
    if uid == 0 && gid == 0 {
        return Ok(root);
    }

    let mut path = PathBuf::from("/");
    for component in root.components() {
        let Component::Normal(segment) = component else {
            continue;
        };
        path.push(segment);

        let traversable = match std::fs::metadata(&path) {
            Ok(meta) => meta.permissions().mode() & 0o001 != 0,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(BerthError::io(&path, e)),
        };
        if traversable {
            continue;
        }

        let mut owned = path.into_os_string();
        owned.push(format!(".{uid}.{gid}"));
        path = PathBuf::from(owned);
        mkdir_as(&path, uid, gid)?;
    }

    tracing::debug!(uid, gid, dir = %path.display(), "prepared remapped bundle root");
    Ok(path)
}

/// Creates `path` and any missing parents, handing each directory it
/// creates to `uid`/`gid`. Existing directories are left untouched.
///
/// # Errors
///
/// Returns an error if a directory cannot be created or chowned.
pub fn mkdir_all_as(path: &Path, uid: u32, gid: u32) -> Result<()> {
    let mut missing = Vec::new();
    let mut cursor = Some(path);
    while let Some(dir) = cursor {
        if dir.as_os_str().is_empty() || dir.exists() {
            break;
        }
        missing.push(dir);
        cursor = dir.parent();
    }
    for dir in missing.into_iter().rev() {
        mkdir_as(dir, uid, gid)?;
    }
    Ok(())
}

fn mkdir_as(path: &Path, uid: u32, gid: u32) -> Result<()> {
    match DirBuilder::new().mode(BUNDLE_DIR_MODE).create(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(()),
        Err(e) => return Err(BerthError::io(path, e)),
    }
    if uid != 0 || gid != 0 {
        chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
            .map_err(|errno| BerthError::io(path, errno.into()))?;
    }
    Ok(())
}
