//! Artifact repository.

use crate::error::MetadataResult;
use crate::models::ArtifactRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for the artifact catalog.
#[async_trait]
pub trait ArtifactRepo: Send + Sync {
    /// Create an artifact. The (tenant, name, device type) combination is
    /// not constrained here; compatibility resolution picks the matching
    /// entry at poll time.
    async fn create_artifact(&self, artifact: &ArtifactRow) -> MetadataResult<()>;

    /// Get an artifact by ID.
    async fn get_artifact(
        &self,
        tenant_id: Uuid,
        artifact_id: Uuid,
    ) -> MetadataResult<Option<ArtifactRow>>;

    /// Find the artifact with the given name whose compatible device type
    /// set contains `device_type`.
    async fn artifact_by_name_and_device_type(
        &self,
        tenant_id: Uuid,
        artifact_name: &str,
        device_type: &str,
    ) -> MetadataResult<Option<ArtifactRow>>;

    /// Check whether any artifact with this name exists at all.
    async fn artifact_name_exists(
        &self,
        tenant_id: Uuid,
        artifact_name: &str,
    ) -> MetadataResult<bool>;

    /// List artifacts, optionally filtered by exact name, ordered by
    /// (name, modified, id) so grouping is stable.
    async fn list_artifacts(
        &self,
        tenant_id: Uuid,
        name: Option<&str>,
    ) -> MetadataResult<Vec<ArtifactRow>>;

    /// Delete an artifact by ID. The caller enforces the active-deployment
    /// reference guard first.
    async fn delete_artifact(&self, tenant_id: Uuid, artifact_id: Uuid) -> MetadataResult<()>;
}
