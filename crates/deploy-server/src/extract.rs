//! Zip extraction into a destination directory.
//!
//! Entries are written in archive index order and overwrite whatever is
//! already at their path. Stored unix modes are applied to files as they
//! are written and to directories once every entry is out, so a read-only
//! directory entry cannot block its own children.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::{DeployError, IoContext};

/// Mode given to parent directories that have no entry of their own.
#[cfg_attr(not(unix), allow(dead_code))]
const PARENT_DIR_MODE: u32 = 0o755;

/// Extract every entry of the zip at `archive_path` under `dest_dir`.
///
/// Returns the number of files written (directories not counted).
///
/// Entries whose name is absolute or climbs out of `dest_dir` with `..`
/// abort the extraction with [`DeployError::UnsafeArchiveEntry`];
/// anything written before that entry stays on disk.
///
/// # Errors
///
/// [`DeployError::ArchiveOpen`] if the file is not a zip,
/// [`DeployError::Extract`] if an entry cannot be read, and
/// [`DeployError::Io`] for filesystem failures under `dest_dir`.
pub fn extract(archive_path: &Path, dest_dir: &Path) -> Result<usize, DeployError> {
    let file = File::open(archive_path)
        .io_context(|| format!("opening archive {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file).map_err(|source| DeployError::ArchiveOpen {
        path: archive_path.to_path_buf(),
        source,
    })?;

    let mut written = 0;
    let mut dir_modes: Vec<(PathBuf, u32)> = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|source| DeployError::Extract { index, source })?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(DeployError::UnsafeArchiveEntry(entry.name().to_string()));
        };
        let target = dest_dir.join(relative);
        let mode = entry.unix_mode();

        if entry.is_dir() {
            tracing::debug!(path = %target.display(), "creating directory");
            fs::create_dir_all(&target)
                .io_context(|| format!("creating directory {}", target.display()))?;
            if let Some(mode) = mode {
                dir_modes.push((target, mode));
            }
            continue;
        }

        tracing::debug!(entry = entry.name(), path = %target.display(), "extracting file");
        if let Some(parent) = target.parent() {
            create_parent_dirs(parent)
                .io_context(|| format!("creating parent directory {}", parent.display()))?;
        }

        let mut out =
            File::create(&target).io_context(|| format!("creating {}", target.display()))?;
        io::copy(&mut entry, &mut out).io_context(|| format!("writing {}", target.display()))?;
        if let Some(mode) = mode {
            set_mode(&target, mode)?;
        }
        written += 1;
    }

    // Deepest first, so restricting a parent never hides a child.
    for (dir, mode) in dir_modes.into_iter().rev() {
        set_mode(&dir, mode)?;
    }

    Ok(written)
}

#[cfg(unix)]
fn create_parent_dirs(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(PARENT_DIR_MODE)
        .create(path)
}

#[cfg(not(unix))]
fn create_parent_dirs(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), DeployError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
        .io_context(|| format!("setting mode {:o} on {}", mode & 0o7777, path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), DeployError> {
    Ok(())
}
