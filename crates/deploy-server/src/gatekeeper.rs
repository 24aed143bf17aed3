//! `/artifact` request handling.
//!
//! Each request walks a fixed sequence and stops at the first failure:
//!
//! 1. method must be `PUT` (405)
//! 2. `X-API-Key` must match the configured key (401)
//! 3. `?id=` must name a known artifact kind (400)
//! 4. the multipart form must carry a `bundle` file (400 / 413)
//! 5. the deploy pipeline runs on the blocking pool (500 on failure)
//!
//! Callers only ever see a short generic message; the detailed cause is
//! logged here.

use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::artifact::ArtifactKind;
use crate::error::DeployError;
use crate::pipeline::{self, DeployReport, Upload};
use crate::state::AppState;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Multipart field holding the uploaded file.
pub const BUNDLE_FIELD: &str = "bundle";

/// Axum handler mounted on the artifact endpoint for every method.
pub async fn handle_artifact(State(state): State<Arc<AppState>>, request: Request) -> Response {
    match admit_and_deploy(&state, request).await {
        Ok(report) => {
            tracing::info!(artifact = %report.kind, files = report.files, "deployed");
            (StatusCode::OK, format!("Deployed {}!\n", report.kind.label())).into_response()
        }
        Err(err) => {
            if err.is_client_error() {
                tracing::warn!(status = %err.status(), error = %err, "request rejected");
            } else {
                tracing::error!(error = %err, "deploy failed");
            }
            err.into_response()
        }
    }
}

async fn admit_and_deploy(
    state: &Arc<AppState>,
    request: Request,
) -> Result<DeployReport, DeployError> {
    check_method(request.method())?;
    authorise(state, request.headers())?;
    let kind = artifact_kind(request.uri())?;
    let upload = read_bundle(request, state.max_upload_bytes()).await?;

    let spec = state.artifacts().spec(kind).clone();
    let report =
        tokio::task::spawn_blocking(move || pipeline::deploy(kind, &spec, &upload)).await??;
    Ok(report)
}

fn check_method(method: &Method) -> Result<(), DeployError> {
    if *method == Method::PUT {
        Ok(())
    } else {
        Err(DeployError::MethodNotAllowed(method.to_string()))
    }
}

fn authorise(state: &AppState, headers: &HeaderMap) -> Result<(), DeployError> {
    let presented = headers.get(API_KEY_HEADER);
    if presented.is_some_and(|value| state.accepts_key(value.as_bytes())) {
        return Ok(());
    }
    // Logged verbatim for audit.
    let shown = presented.map_or_else(
        || "<none>".to_string(),
        |value| String::from_utf8_lossy(value.as_bytes()).into_owned(),
    );
    tracing::warn!(presented_key = %shown, "unauthorised deploy attempt");
    Err(DeployError::Unauthorized)
}

/// Resolve `?id=` to an artifact kind. A repeated `id` resolves to its
/// first value.
fn artifact_kind(uri: &Uri) -> Result<ArtifactKind, DeployError> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map_err(|_| DeployError::MissingArtifactId)?;
    let id = pairs
        .into_iter()
        .find_map(|(key, value)| (key == "id").then_some(value));
    match id.as_deref() {
        None | Some("") => Err(DeployError::MissingArtifactId),
        Some(id) => id.parse(),
    }
}

/// Pull the `bundle` file out of the multipart body.
///
/// Fields with other names are skipped, as are `bundle` parts without a
/// filename; the first `bundle` file part wins. The body limit is enforced by the
/// router's `DefaultBodyLimit`; hitting it surfaces here as a
/// `PAYLOAD_TOO_LARGE` multipart error, before anything is written.
async fn read_bundle(request: Request, limit: usize) -> Result<Upload, DeployError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| DeployError::MalformedForm(rejection.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| form_error(&err, limit))?
    {
        if field.name() != Some(BUNDLE_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_owned) else {
            tracing::debug!("skipping bundle field without a filename");
            continue;
        };
        let bytes = field.bytes().await.map_err(|err| form_error(&err, limit))?;
        return Ok(Upload { filename, bytes });
    }

    Err(DeployError::MissingBundle(BUNDLE_FIELD))
}

fn form_error(err: &MultipartError, limit: usize) -> DeployError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        DeployError::PayloadTooLarge { limit }
    } else {
        DeployError::MalformedForm(err.body_text())
    }
}
