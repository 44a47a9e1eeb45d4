//! HTTP API server for the hangar device deployment service.
//!
//! This crate provides the HTTP control plane and the orchestration core:
//! - Deployment lifecycle management (create, abort, projections)
//! - The per-device assignment engine behind device polls
//! - Device status tracking with atomic statistics updates
//! - Signed artifact download links
//! - Artifact catalog, releases and direct uploads
//! - Internal tenant and storage-settings endpoints

pub mod deployments;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod introspect;
pub mod metrics;
pub mod routes;
pub mod state;

pub use deployments::Deployments;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
