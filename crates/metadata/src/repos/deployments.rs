//! Deployment repository.

use crate::error::MetadataResult;
use crate::models::{DeploymentRow, DeploymentStatRow, DeviceDeploymentRow};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for deployment campaigns.
#[async_trait]
pub trait DeploymentRepo: Send + Sync {
    /// Create a deployment together with its device deployments and
    /// seeded statistics, atomically. Fails with `AlreadyExists` when the
    /// deployment ID is taken (caller-supplied configuration identities).
    async fn create_deployment(
        &self,
        deployment: &DeploymentRow,
        devices: &[DeviceDeploymentRow],
    ) -> MetadataResult<()>;

    /// Get a deployment by ID.
    async fn get_deployment(
        &self,
        tenant_id: Uuid,
        deployment_id: Uuid,
    ) -> MetadataResult<Option<DeploymentRow>>;

    /// List deployments for a tenant, newest first.
    async fn list_deployments(&self, tenant_id: Uuid) -> MetadataResult<Vec<DeploymentRow>>;

    /// Read the per-status device counters for a deployment.
    async fn deployment_stats(
        &self,
        tenant_id: Uuid,
        deployment_id: Uuid,
    ) -> MetadataResult<Vec<DeploymentStatRow>>;

    /// Mark a deployment finished, if not already.
    async fn finish_deployment(
        &self,
        tenant_id: Uuid,
        deployment_id: Uuid,
        finished_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Check whether any unfinished deployment targets this artifact name.
    /// Guards artifact deletion.
    async fn artifact_name_in_active_deployment(
        &self,
        tenant_id: Uuid,
        artifact_name: &str,
    ) -> MetadataResult<bool>;
}
