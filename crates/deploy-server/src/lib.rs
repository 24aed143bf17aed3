//! Deploy receiver library.
//!
//! Accepts an authenticated `PUT /artifact?id=<kind>` multipart upload,
//! stages it on local disk and swaps it into the live deploy directory
//! for that artifact kind. The binary in `main.rs` only wires config,
//! tracing and the listener around [`server::router`].

pub mod artifact;
pub mod config;
pub mod copy;
pub mod error;
pub mod extract;
pub mod gatekeeper;
pub mod pipeline;
pub mod server;
pub mod state;


pub use artifact::{ArtifactKind, ArtifactSpec, ArtifactTable, Strategy};
pub use config::Config;
pub use error::DeployError;
pub use state::AppState;
