//! Removal of generated directories.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Recursively delete every directory in `dirs`.
///
/// Missing directories are not an error, so cleaning twice is a no-op.
/// Returns the directories that actually existed.
pub fn clean_dirs(dirs: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for dir in dirs {
        if remove_tree(dir)? {
            removed.push(dir.clone());
        }
    }
    Ok(removed)
}

fn remove_tree(dir: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            tracing::debug!(dir = %dir.display(), "removed");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
