//! Database models mapping to the metadata schema.
//!
//! Every row is tenant-partitioned; queries never cross tenant boundaries.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Tenant record.
#[derive(Debug, Clone, FromRow)]
pub struct TenantRow {
    pub tenant_id: Uuid,
    pub created_at: OffsetDateTime,
}

/// Artifact record. Immutable once written; deleted only while no active
/// deployment references its name.
#[derive(Debug, Clone, FromRow)]
pub struct ArtifactRow {
    pub artifact_id: Uuid,
    pub tenant_id: Uuid,
    pub artifact_name: String,
    pub description: String,
    pub size_bytes: i64,
    pub checksum: String,
    /// JSON array of compatible device types.
    pub device_types: String,
    /// JSON array of update descriptors (type tag, files, provides).
    pub updates: String,
    /// Object storage key of the payload, if one was uploaded.
    pub object_key: Option<String>,
    pub modified_at: OffsetDateTime,
}

/// Deployment record.
#[derive(Debug, Clone, FromRow)]
pub struct DeploymentRow {
    pub deployment_id: Uuid,
    pub tenant_id: Uuid,
    pub deployment_name: String,
    pub artifact_name: String,
    /// "software" or "configuration".
    pub kind: String,
    /// Opaque configuration payload for configuration deployments.
    pub configuration: Option<Vec<u8>>,
    pub created_at: OffsetDateTime,
    pub finished_at: Option<OffsetDateTime>,
    /// Number of devices targeted at creation time.
    pub max_devices: i64,
}

/// Per-status device counter for one deployment.
///
/// The sum over all statuses always equals the deployment's device count;
/// counters move bucket-to-bucket inside the same transaction as the
/// device status update.
#[derive(Debug, Clone, FromRow)]
pub struct DeploymentStatRow {
    pub tenant_id: Uuid,
    pub deployment_id: Uuid,
    pub status: String,
    pub device_count: i64,
}

/// Per-device sub-record of a deployment.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceDeploymentRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub deployment_id: Uuid,
    pub device_id: String,
    pub status: String,
    /// Device type recorded when the artifact was assigned.
    pub device_type: Option<String>,
    /// Artifact resolved for this device, once assigned.
    pub artifact_id: Option<Uuid>,
    pub substate: Option<String>,
    pub log_available: bool,
    /// Insertion order within the deployment, for stable pagination.
    pub position: i64,
    pub created_at: OffsetDateTime,
    pub finished_at: Option<OffsetDateTime>,
}

/// One deployment log line.
#[derive(Debug, Clone, FromRow)]
pub struct LogMessageRow {
    pub tenant_id: Uuid,
    pub deployment_id: Uuid,
    pub device_id: String,
    pub seq: i64,
    pub level: String,
    pub message: String,
    pub created_at: OffsetDateTime,
}

/// Free-text notes attached to a release name.
#[derive(Debug, Clone, FromRow)]
pub struct ReleaseNoteRow {
    pub tenant_id: Uuid,
    pub release_name: String,
    pub notes: String,
    pub updated_at: OffsetDateTime,
}

/// Direct-upload intent record.
#[derive(Debug, Clone, FromRow)]
pub struct UploadIntentRow {
    pub upload_id: Uuid,
    pub tenant_id: Uuid,
    /// "pending", "processing" or "done".
    pub status: String,
    /// Object storage key the pre-signed write points at.
    pub object_key: String,
    /// Caller-supplied metadata recorded at completion (JSON).
    pub metadata: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Per-tenant object storage settings.
#[derive(Debug, Clone, FromRow)]
pub struct StorageSettingsRow {
    pub tenant_id: Uuid,
    pub bucket: String,
    pub region: String,
    pub uri: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
    pub updated_at: OffsetDateTime,
}
