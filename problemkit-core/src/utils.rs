use std::{
    collections::HashMap,
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::error::CoreError;

/// Regular file with any execute bit set.
pub fn is_executable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(metadata) => metadata.is_file() && metadata.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

pub fn files_equal(path1: &Path, path2: &Path) -> Result<bool, CoreError> {
    let metadata1 = fs::metadata(path1)?;
    let metadata2 = fs::metadata(path2)?;
    if metadata1.len() != metadata2.len() {
        return Ok(false);
    }
    Ok(fs::read(path1)? == fs::read(path2)?)
}

/// Rename, falling back to copy and delete across file systems.
pub fn move_file(source: &Path, target: &Path) -> Result<(), CoreError> {
    log::debug!("moving {:?} to {:?}", source, target);
    if fs::rename(source, target).is_err() {
        fs::copy(source, target)?;
        fs::remove_file(source)?;
    }
    Ok(())
}

/// Remove `dir` and its ancestors up to (excluding) `stop` while they are
/// empty.
pub fn prune_empty_dirs(dir: &Path, stop: &Path) {
    let mut current = Some(dir);
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) || fs::remove_dir(dir).is_err() {
            return;
        }
        log::debug!("removed empty dir: {:?}", dir);
        current = dir.parent();
    }
}

/// One mutex per path, handed out on demand.
#[derive(Debug, Default)]
pub struct PathLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    pub fn get(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(path.to_owned()).or_default().clone()
    }
}
