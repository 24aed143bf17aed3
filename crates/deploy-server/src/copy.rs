//! Recursive directory copy preserving permissions.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::DeployError;

/// Copy every directory and regular file under `src_dir` into `dst_dir`.
///
/// The walk is depth-first in directory-listing order and does not follow
/// symlinks; anything that is neither a directory nor a regular file is
/// skipped. Existing files in `dst_dir` are truncated and overwritten.
/// Returns the number of files copied.
///
/// Stops at the first failure. Whatever was copied before it stays.
///
/// # Errors
///
/// [`DeployError::Copy`] naming the path that could not be read or written.
pub fn copy_tree(src_dir: &Path, dst_dir: &Path) -> Result<usize, DeployError> {
    let mut copied = 0;
    let mut dir_perms: Vec<(PathBuf, fs::Permissions)> = Vec::new();

    for entry in WalkDir::new(src_dir).follow_links(false) {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(src_dir).to_path_buf();
            copy_error(path, err.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(src_dir)
            .map_err(|err| copy_error(entry.path().to_path_buf(), io::Error::other(err)))?;
        let target = dst_dir.join(relative);
        let metadata = entry
            .metadata()
            .map_err(|err| copy_error(entry.path().to_path_buf(), err.into()))?;

        if metadata.is_dir() {
            fs::create_dir_all(&target).map_err(|err| copy_error(target.clone(), err))?;
            dir_perms.push((target, metadata.permissions()));
        } else if metadata.is_file() {
            copy_file(entry.path(), &target)?;
            fs::set_permissions(&target, metadata.permissions())
                .map_err(|err| copy_error(target.clone(), err))?;
            copied += 1;
        } else {
            tracing::debug!(path = %entry.path().display(), "skipping non-regular entry");
        }
    }

    // Applied last and deepest first so read-only directories still fill.
    for (dir, perms) in dir_perms.into_iter().rev() {
        fs::set_permissions(&dir, perms).map_err(|err| copy_error(dir.clone(), err))?;
    }

    Ok(copied)
}

fn copy_file(from: &Path, to: &Path) -> Result<u64, DeployError> {
    let mut reader = File::open(from).map_err(|err| copy_error(from.to_path_buf(), err))?;
    let mut writer = File::create(to).map_err(|err| copy_error(to.to_path_buf(), err))?;
    io::copy(&mut reader, &mut writer).map_err(|err| copy_error(to.to_path_buf(), err))
}

fn copy_error(path: PathBuf, source: io::Error) -> DeployError {
    DeployError::Copy { path, source }
}
