//! Core domain types and shared logic for the hangar deployment service.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Identifier newtypes for tenants, deployments, devices and artifacts
//! - Artifact and release metadata
//! - Deployment campaigns and the per-device status state machine
//! - Aggregate deployment statistics
//! - Deployment logs, upload intents and download links
//! - Configuration types

pub mod artifact;
pub mod config;
pub mod deployment;
pub mod device_deployment;
pub mod error;
pub mod ids;
pub mod link;
pub mod log;
pub mod release;
pub mod upload;

pub use artifact::{Artifact, ArtifactMeta, Update, UpdateFile, UpdateType};
pub use deployment::{
    ConfigurationDeploymentConstructor, Deployment, DeploymentConstructor, DeploymentKind,
    DeploymentStatus,
};
pub use device_deployment::{
    ACTIVE_STATUSES, ALL_STATUSES, DeviceStatus, InstalledArtifact, Stats, StatusReport,
    Transition, verify_transition,
};
pub use error::{Error, Result};
pub use ids::{ArtifactId, DeploymentId, DeviceId, TenantId, UploadId};
pub use link::Link;
pub use log::{DeploymentLog, LogMessage};
pub use release::{Release, ReleaseNotes, group_releases};
pub use upload::{UploadIntent, UploadStatus};

/// Default number of device deployments per page.
pub const DEFAULT_PER_PAGE: i64 = 20;

/// Maximum number of device deployments per page.
pub const MAX_PER_PAGE: i64 = 500;
