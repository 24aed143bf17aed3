//! Artifact kinds and the fixed on-disk layout for each.
//!
//! Each kind maps to exactly one [`ArtifactSpec`]: where uploads are
//! staged, where the live content lives, which file extension the upload
//! must carry and how it is turned into deploy content.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::DeployError;

/// Live site content served by the web server.
pub const SITE_DEPLOY_PATH: &str = "/var/www/site";
/// Scratch area for site uploads.
pub const SITE_STAGING_PATH: &str = "/tmp/site-tmp";
/// Live LOC data directory.
pub const LOC_DEPLOY_PATH: &str = "/var/www/loc";
/// Scratch area for LOC uploads.
pub const LOC_STAGING_PATH: &str = "/tmp/loc-tmp";

/// File name the LOC JSON is stored under, in staging and when deployed.
pub const LOC_FILE_NAME: &str = "loc.json";

/// Artifact kinds accepted on the `id` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Static site bundle shipped as a zip archive.
    Site,
    /// Single JSON data file.
    Loc,
}

impl ArtifactKind {
    pub const ALL: [Self; 2] = [Self::Site, Self::Loc];

    /// Identifier used on the wire (`?id=`).
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Site => "site",
            Self::Loc => "loc",
        }
    }

    /// Name used in confirmation text and logs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Site => "site",
            Self::Loc => "LOC",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ArtifactKind {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| DeployError::UnknownArtifact(s.to_string()))
    }
}

/// How an upload becomes deploy content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Upload is a zip archive; its extracted tree becomes the deploy dir.
    Archive,
    /// Upload is copied into the deploy dir under a fixed name.
    SingleFile { file_name: &'static str },
}

/// Paths and rules for one artifact kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub staging_dir: PathBuf,
    pub deploy_dir: PathBuf,
    /// Required upload extension, without the leading dot.
    pub extension: &'static str,
    pub strategy: Strategy,
}

/// The full set of artifact kinds and their layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactTable {
    site: ArtifactSpec,
    loc: ArtifactSpec,
}

impl ArtifactTable {
    /// Production layout.
    #[must_use]
    pub fn standard() -> Self {
        Self::with_paths(
            (SITE_STAGING_PATH.into(), SITE_DEPLOY_PATH.into()),
            (LOC_STAGING_PATH.into(), LOC_DEPLOY_PATH.into()),
        )
    }

    /// Same layout as [`ArtifactTable::standard`] re-rooted under `root`
    /// (`<root>/tmp/site-tmp`, `<root>/var/www/site`, ...).
    #[must_use]
    pub fn rooted_at(root: &Path) -> Self {
        let under = |p: &str| root.join(p.trim_start_matches('/'));
        Self::with_paths(
            (under(SITE_STAGING_PATH), under(SITE_DEPLOY_PATH)),
            (under(LOC_STAGING_PATH), under(LOC_DEPLOY_PATH)),
        )
    }

    fn with_paths(site: (PathBuf, PathBuf), loc: (PathBuf, PathBuf)) -> Self {
        Self {
            site: ArtifactSpec {
                staging_dir: site.0,
                deploy_dir: site.1,
                extension: "zip",
                strategy: Strategy::Archive,
            },
            loc: ArtifactSpec {
                staging_dir: loc.0,
                deploy_dir: loc.1,
                extension: "json",
                strategy: Strategy::SingleFile {
                    file_name: LOC_FILE_NAME,
                },
            },
        }
    }

    #[must_use]
    pub fn spec(&self, kind: ArtifactKind) -> &ArtifactSpec {
        match kind {
            ArtifactKind::Site => &self.site,
            ArtifactKind::Loc => &self.loc,
        }
    }
}
