//! Shared test helpers: test server, multipart bodies, zip fixtures.

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;
use walkdir::WalkDir;
use zip::write::{SimpleFileOptions, ZipWriter};

use deploy_server::artifact::ArtifactKind;
use deploy_server::{AppState, ArtifactSpec, ArtifactTable, Config, server};

pub const API_KEY: &str = "test-key-123";
const BOUNDARY: &str = "deploy-test-boundary";

// ── Test server ──────────────────────────────────────────────────────────────

/// A router whose artifact directories live under a private temp root.
pub struct TestServer {
    pub root: TempDir,
    pub artifacts: ArtifactTable,
    router: Router,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_limit(1 << 20)
    }

    pub fn with_limit(max_upload_bytes: usize) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let config = Config::from_vars([
            ("HAKO_DEPLOY_API_KEY", API_KEY.to_string()),
            ("HAKO_DEPLOY_MAX_UPLOAD_BYTES", max_upload_bytes.to_string()),
        ])
        .expect("config");
        let artifacts = ArtifactTable::rooted_at(root.path());
        let state = Arc::new(AppState::new(&config, artifacts.clone()));
        Self {
            root,
            artifacts,
            router: server::router(state),
        }
    }

    pub fn spec(&self, kind: ArtifactKind) -> &ArtifactSpec {
        self.artifacts.spec(kind)
    }

    /// Send `request` and return the status plus the body as text.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Snapshot of every path under the temp root.
    pub fn snapshot(&self) -> Vec<(String, Option<Vec<u8>>)> {
        snapshot(self.root.path())
    }
}

// ── Request builders ─────────────────────────────────────────────────────────

/// Builder for `/artifact` requests.
pub struct ArtifactRequest {
    method: &'static str,
    uri: String,
    api_key: Option<String>,
    body: Option<(String, Vec<u8>)>,
}

impl ArtifactRequest {
    pub fn put(id: &str) -> Self {
        Self {
            method: "PUT",
            uri: format!("/artifact?id={id}"),
            api_key: Some(API_KEY.to_string()),
            body: None,
        }
    }

    pub fn method(mut self, method: &'static str) -> Self {
        self.method = method;
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        self.uri = uri.to_string();
        self
    }

    pub fn api_key(mut self, key: Option<&str>) -> Self {
        self.api_key = key.map(str::to_string);
        self
    }

    /// Attach a multipart form with a `bundle` file field.
    pub fn bundle(mut self, filename: &str, contents: &[u8]) -> Self {
        self.body = Some((filename.to_string(), contents.to_vec()));
        self
    }

    pub fn build(self) -> Request<Body> {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        if let Some(key) = self.api_key {
            builder = builder.header("X-API-Key", key);
        }
        let body = match self.body {
            Some((filename, contents)) => {
                builder = builder.header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                );
                Body::from(multipart_body(&[("bundle", Some(&filename), &contents)]))
            }
            None => Body::empty(),
        };
        builder.body(body).expect("valid request")
    }
}

/// Encode `(field name, optional filename, contents)` parts as a
/// `multipart/form-data` body using the shared test boundary.
pub fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, contents) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(contents);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

/// Zip archive bytes with the given `(name, contents)` files (mode 0644).
/// Names ending in `/` become directory entries.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, contents) in entries {
        if name.ends_with('/') {
            let opts = SimpleFileOptions::default().unix_permissions(0o755);
            writer.add_directory(*name, opts).expect("add dir");
        } else {
            let opts = SimpleFileOptions::default().unix_permissions(0o644);
            writer.start_file(*name, opts).expect("start file");
            writer.write_all(contents).expect("write entry");
        }
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Sorted `(relative path, contents)` listing; directories have `None`.
pub fn snapshot(root: &Path) -> Vec<(String, Option<Vec<u8>>)> {
    if !root.exists() {
        return Vec::new();
    }
    let mut out: Vec<_> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            let entry = entry.expect("walk entry");
            let rel = entry
                .path()
                .strip_prefix(root)
                .expect("under root")
                .to_string_lossy()
                .replace('\\', "/");
            let contents = (!entry.file_type().is_dir())
                .then(|| fs::read(entry.path()).expect("read file"));
            (rel, contents)
        })
        .collect();
    out.sort();
    out
}
