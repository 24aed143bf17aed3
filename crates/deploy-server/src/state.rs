//! Shared, immutable per-process state handed to every request.

use std::fmt;

use crate::artifact::ArtifactTable;
use crate::config::Config;

/// Everything a request needs: the API key, the upload cap and the
/// artifact layout. Built once at startup and shared behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    api_key: String,
    max_upload_bytes: usize,
    artifacts: ArtifactTable,
}

impl AppState {
    #[must_use]
    pub fn new(config: &Config, artifacts: ArtifactTable) -> Self {
        Self {
            api_key: config.api_key.clone(),
            max_upload_bytes: config.max_upload_bytes,
            artifacts,
        }
    }

    /// `true` if `presented` is exactly the configured key.
    ///
    /// Plain byte equality; this is not a constant-time comparison.
    #[must_use]
    pub fn accepts_key(&self, presented: &[u8]) -> bool {
        presented == self.api_key.as_bytes()
    }

    #[must_use]
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    #[must_use]
    pub fn artifacts(&self) -> &ArtifactTable {
        &self.artifacts
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("api_key", &"<redacted>")
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("artifacts", &self.artifacts)
            .finish()
    }
}
