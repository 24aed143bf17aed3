//! Deploy pipeline: stage an upload, build the new content, swap it live.
//!
//! All functions here are blocking. The HTTP layer runs [`deploy`] on the
//! blocking pool.
//!
//! ## Replace sequence
//!
//! The new deploy tree is built in a hidden sibling of the live directory
//! (`.<name>.incoming`) and swapped in with two renames:
//!
//! ```text
//! live      -> .<name>.previous
//! incoming  -> live
//! rm -rf .<name>.previous
//! ```
//!
//! The live path is only missing between the two renames. A failure while
//! building `incoming` leaves the live content untouched. Nothing is rolled
//! back if the second rename fails, and concurrent deploys of the same kind
//! are not serialised.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use axum::body::Bytes;

use crate::artifact::{ArtifactKind, ArtifactSpec, Strategy};
use crate::copy::copy_tree;
use crate::error::{DeployError, IoContext};
use crate::extract::extract;

/// Name the raw archive is stored under inside the staging directory.
pub const STAGED_ARCHIVE_NAME: &str = "upload.zip";

/// Directory inside staging that receives the extracted archive.
pub const STAGED_CONTENT_DIR: &str = "content";

/// An uploaded file as received from the form.
#[derive(Debug, Clone)]
pub struct Upload {
    /// File name supplied by the client; only its extension is used.
    pub filename: String,
    pub bytes: Bytes,
}

/// Outcome of a successful deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployReport {
    pub kind: ArtifactKind,
    /// Files now present in the deploy directory.
    pub files: usize,
}

/// Run the full deploy for `kind` using the layout in `spec`.
///
/// # Errors
///
/// [`DeployError::BadExtension`] before touching the disk if the upload
/// has the wrong extension, otherwise whichever filesystem or archive
/// error aborted the sequence.
pub fn deploy(
    kind: ArtifactKind,
    spec: &ArtifactSpec,
    upload: &Upload,
) -> Result<DeployReport, DeployError> {
    check_extension(&upload.filename, spec.extension)?;

    tracing::info!(
        artifact = %kind,
        filename = %upload.filename,
        bytes = upload.bytes.len(),
        "deploy started",
    );

    let files = match spec.strategy {
        Strategy::Archive => deploy_archive(spec, upload)?,
        Strategy::SingleFile { file_name } => deploy_single_file(spec, upload, file_name)?,
    };

    tracing::info!(
        artifact = %kind,
        deploy_dir = %spec.deploy_dir.display(),
        files,
        "deploy finished",
    );
    Ok(DeployReport { kind, files })
}

// ---------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------

fn deploy_archive(spec: &ArtifactSpec, upload: &Upload) -> Result<usize, DeployError> {
    reset_dir(&spec.staging_dir)?;

    let archive_path = spec.staging_dir.join(STAGED_ARCHIVE_NAME);
    write_upload(&archive_path, &upload.bytes)?;

    let content_dir = spec.staging_dir.join(STAGED_CONTENT_DIR);
    fs::create_dir_all(&content_dir)
        .io_context(|| format!("creating {}", content_dir.display()))?;
    let extracted = extract(&archive_path, &content_dir)?;
    tracing::debug!(files = extracted, "archive extracted to staging");

    replace_dir(&spec.deploy_dir, |incoming| copy_tree(&content_dir, incoming))
}

fn deploy_single_file(
    spec: &ArtifactSpec,
    upload: &Upload,
    file_name: &str,
) -> Result<usize, DeployError> {
    reset_dir(&spec.staging_dir)?;

    let staged = spec.staging_dir.join(file_name);
    write_upload(&staged, &upload.bytes)?;

    replace_dir(&spec.deploy_dir, |incoming| {
        let target = incoming.join(file_name);
        fs::copy(&staged, &target).map_err(|source| DeployError::Copy {
            path: target.clone(),
            source,
        })?;
        Ok(1)
    })
}

// ---------------------------------------------------------------
// Steps
// ---------------------------------------------------------------

/// Case-insensitive check that `filename` ends in `.<expected>`.
///
/// # Errors
///
/// [`DeployError::BadExtension`] on mismatch or when there is no extension.
pub fn check_extension(filename: &str, expected: &'static str) -> Result<(), DeployError> {
    let matches = Path::new(filename)
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case(expected));
    if matches {
        Ok(())
    } else {
        Err(DeployError::BadExtension {
            filename: filename.to_string(),
            expected,
        })
    }
}

/// Delete `dir` with everything in it (if present) and recreate it empty.
///
/// # Errors
///
/// [`DeployError::Io`] if removal or creation fails.
pub fn reset_dir(dir: &Path) -> Result<(), DeployError> {
    remove_dir_if_exists(dir)?;
    fs::create_dir_all(dir).io_context(|| format!("creating {}", dir.display()))
}

fn write_upload(path: &Path, bytes: &[u8]) -> Result<(), DeployError> {
    let mut file = File::create(path).io_context(|| format!("creating {}", path.display()))?;
    file.write_all(bytes)
        .and_then(|()| file.sync_all())
        .io_context(|| format!("writing upload to {}", path.display()))
}

/// Build new content for `live` with `populate` and swap it into place.
///
/// `populate` receives an empty directory and returns how many files it
/// wrote. Stale `incoming`/`previous` siblings left by an interrupted
/// deploy are removed first.
///
/// # Errors
///
/// Any error from `populate`, or [`DeployError::Io`] from the swap.
pub fn replace_dir<F>(live: &Path, populate: F) -> Result<usize, DeployError>
where
    F: FnOnce(&Path) -> Result<usize, DeployError>,
{
    let incoming = sibling(live, "incoming")?;
    let previous = sibling(live, "previous")?;

    if let Some(parent) = live.parent() {
        fs::create_dir_all(parent).io_context(|| format!("creating {}", parent.display()))?;
    }
    remove_dir_if_exists(&incoming)?;
    remove_dir_if_exists(&previous)?;
    fs::create_dir(&incoming).io_context(|| format!("creating {}", incoming.display()))?;

    let files = populate(&incoming)?;

    let had_live = match fs::symlink_metadata(live) {
        Ok(_) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => false,
        Err(err) => return Err(err).io_context(|| format!("inspecting {}", live.display())),
    };
    if had_live {
        fs::rename(live, &previous).io_context(|| {
            format!("moving {} aside to {}", live.display(), previous.display())
        })?;
    }
    fs::rename(&incoming, live)
        .io_context(|| format!("moving {} into {}", incoming.display(), live.display()))?;
    // The new content is live at this point; a leftover `previous` is
    // cleared by the next deploy.
    if had_live {
        if let Err(err) = remove_dir_if_exists(&previous) {
            tracing::warn!(
                path = %previous.display(),
                error = %err,
                "could not remove previous content",
            );
        }
    }

    Ok(files)
}

fn sibling(live: &Path, suffix: &str) -> Result<PathBuf, DeployError> {
    let name = live.file_name().ok_or_else(|| DeployError::Io {
        context: format!("deploy path {} has no final component", live.display()),
        source: io::Error::from(io::ErrorKind::InvalidInput),
    })?;
    Ok(live.with_file_name(format!(".{}.{suffix}", name.to_string_lossy())))
}

/// Remove `dir` and everything under it; a missing `dir` is not an error.
///
/// Deployed trees may carry directory modes without owner write (an archive
/// entry stored as `0555`, say). When removal is refused, every directory
/// in the tree is made owner-writable and the removal is retried once.
pub(crate) fn remove_dir_if_exists(dir: &Path) -> Result<(), DeployError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            tracing::debug!(path = %dir.display(), "removal refused, unlocking directories");
            make_dirs_writable(dir)?;
            fs::remove_dir_all(dir).io_context(|| format!("removing {}", dir.display()))
        }
        Err(err) => Err(err).io_context(|| format!("removing {}", dir.display())),
    }
}

/// Add `u+rwx` to `dir` and every directory below it.
///
/// Each directory is unlocked before it is listed. `walkdir` opens a
/// directory before yielding it, so it cannot be used here.
#[cfg(unix)]
fn make_dirs_writable(dir: &Path) -> Result<(), DeployError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::symlink_metadata(dir)
        .io_context(|| format!("inspecting {}", dir.display()))?
        .permissions()
        .mode();
    if mode & 0o700 != 0o700 {
        fs::set_permissions(dir, fs::Permissions::from_mode(mode | 0o700))
            .io_context(|| format!("unlocking {}", dir.display()))?;
    }

    for entry in fs::read_dir(dir).io_context(|| format!("listing {}", dir.display()))? {
        let entry = entry.io_context(|| format!("listing {}", dir.display()))?;
        let file_type = entry
            .file_type()
            .io_context(|| format!("inspecting {}", entry.path().display()))?;
        if file_type.is_dir() {
            make_dirs_writable(&entry.path())?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn make_dirs_writable(_dir: &Path) -> Result<(), DeployError> {
    Ok(())
}
