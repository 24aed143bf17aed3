//! Error taxonomy for the deploy receiver.
//!
//! Every failure a request can hit is a [`DeployError`] variant. The
//! variant decides the HTTP status and the short message the caller sees;
//! the full `Display` text (with paths and OS errors) is only logged.

use std::io;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

// ── Request / deploy errors ──────────────────────────────────────────────────

/// Errors raised while admitting a request or running a deploy.
#[derive(Debug, Error)]
pub enum DeployError {
    // Protocol errors: client-facing 4xx, never retried.
    #[error("method {0} not allowed, only PUT is accepted")]
    MethodNotAllowed(String),

    #[error("missing 'id' query parameter")]
    MissingArtifactId,

    #[error("unknown artifact id '{0}'")]
    UnknownArtifact(String),

    #[error("upload '{filename}' is not a .{expected} file")]
    BadExtension {
        filename: String,
        expected: &'static str,
    },

    #[error("malformed multipart form: {0}")]
    MalformedForm(String),

    #[error("no file uploaded in form field '{0}'")]
    MissingBundle(&'static str),

    #[error("upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    // Auth.
    #[error("missing or wrong API key")]
    Unauthorized,

    // Filesystem errors: 500, deploy may be partially applied.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot open archive {}: {source}", path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("cannot read archive entry #{index}: {source}")]
    Extract {
        index: usize,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("archive entry '{0}' escapes the extraction directory")]
    UnsafeArchiveEntry(String),

    #[error("copy failed at {}: {source}", path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("deploy task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl DeployError {
    /// HTTP status reported to the caller.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MissingArtifactId
            | Self::UnknownArtifact(_)
            | Self::BadExtension { .. }
            | Self::MalformedForm(_)
            | Self::MissingBundle(_) => StatusCode::BAD_REQUEST,
            Self::Io { .. }
            | Self::ArchiveOpen { .. }
            | Self::Extract { .. }
            | Self::UnsafeArchiveEntry(_)
            | Self::Copy { .. }
            | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Generic message sent back in the response body.
    ///
    /// Never includes server paths or OS error text.
    #[must_use]
    pub fn client_message(&self) -> String {
        let msg = match self {
            Self::MethodNotAllowed(_) => "Method not allowed. Use PUT.",
            Self::Unauthorized => "Unauthorised",
            Self::MissingArtifactId | Self::UnknownArtifact(_) => "Invalid 'id' query parameter",
            Self::BadExtension { expected, .. } => return format!("File must be a .{expected}\n"),
            Self::MalformedForm(_) => "Bad request",
            Self::MissingBundle(_) => "No bundle uploaded",
            Self::PayloadTooLarge { .. } => "Upload too large",
            Self::UnsafeArchiveEntry(_) | Self::ArchiveOpen { .. } | Self::Extract { .. } => {
                "Failed to unpack bundle"
            }
            Self::Io { .. } | Self::Copy { .. } | Self::Task(_) => "Deployment failed",
        };
        format!("{msg}\n")
    }

    /// `true` for errors caused by the caller rather than the server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl IntoResponse for DeployError {
    fn into_response(self) -> Response {
        (self.status(), self.client_message()).into_response()
    }
}

// ── io::Error context helper ─────────────────────────────────────────────────

/// Attach a human-readable context to an `io::Result`, turning it into a
/// [`DeployError::Io`].
pub trait IoContext<T> {
    /// # Errors
    ///
    /// Returns [`DeployError::Io`] wrapping the original error.
    fn io_context<F>(self, context: F) -> Result<T, DeployError>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F>(self, context: F) -> Result<T, DeployError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| DeployError::Io {
            context: context(),
            source,
        })
    }
}
