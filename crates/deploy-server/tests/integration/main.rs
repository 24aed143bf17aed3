//! Router-level tests for the deploy receiver.
//!
//! Every test drives the real `axum::Router` with `tower::ServiceExt::oneshot`
//! against an artifact layout rooted in a temporary directory.

mod helpers;
