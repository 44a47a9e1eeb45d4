//! Repository traits for metadata operations.

pub mod artifacts;
pub mod deployments;
pub mod device_deployments;
pub mod logs;
pub mod releases;
pub mod settings;
pub mod tenants;
pub mod uploads;

pub use artifacts::ArtifactRepo;
pub use deployments::DeploymentRepo;
pub use device_deployments::DeviceDeploymentRepo;
pub use logs::LogRepo;
pub use releases::ReleaseRepo;
pub use settings::SettingsRepo;
pub use tenants::TenantRepo;
pub use uploads::UploadIntentRepo;
