//! Device deployment repository.

use crate::error::MetadataResult;
use crate::models::DeviceDeploymentRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for per-device deployment records.
///
/// Status transitions and their statistics deltas are a single unit: the
/// implementation must apply them with an atomic conditional update keyed
/// on the expected prior status, so concurrent reports for the same
/// device can neither double-count nor apply out of order.
#[async_trait]
pub trait DeviceDeploymentRepo: Send + Sync {
    /// Get the device deployment for (deployment, device).
    async fn get_device_deployment(
        &self,
        tenant_id: Uuid,
        deployment_id: Uuid,
        device_id: &str,
    ) -> MetadataResult<Option<DeviceDeploymentRow>>;

    /// Find the device deployment belonging to the earliest-created
    /// unfinished deployment that still has this device in an active
    /// status.
    async fn find_oldest_active_for_device(
        &self,
        tenant_id: Uuid,
        device_id: &str,
    ) -> MetadataResult<Option<DeviceDeploymentRow>>;

    /// Conditionally transition the device status from `expected` to `to`
    /// and move one device between the matching statistics buckets, in one
    /// transaction. When the transition empties the deployment's active
    /// set, the deployment is marked finished in the same transaction.
    ///
    /// Returns `false` without side effects when the current status is no
    /// longer `expected` (a concurrent writer won the race).
    #[allow(clippy::too_many_arguments)]
    async fn transition_device_status(
        &self,
        tenant_id: Uuid,
        deployment_id: Uuid,
        device_id: &str,
        expected: &str,
        to: &str,
        substate: Option<&str>,
        finished_at: Option<OffsetDateTime>,
    ) -> MetadataResult<bool>;

    /// Record the artifact and device type resolved for a device
    /// deployment.
    async fn assign_artifact(
        &self,
        tenant_id: Uuid,
        deployment_id: Uuid,
        device_id: &str,
        artifact_id: Uuid,
        device_type: &str,
    ) -> MetadataResult<()>;

    /// Force every still-active device deployment to `aborted`,
    /// recompute the statistics buckets from the rows, and mark the
    /// deployment finished, in one transaction. Returns the number of
    /// device deployments aborted.
    async fn abort_device_deployments(
        &self,
        tenant_id: Uuid,
        deployment_id: Uuid,
        finished_at: OffsetDateTime,
    ) -> MetadataResult<u64>;

    /// Force every still-active device deployment of this device, across
    /// deployments, to `decommissioned`. Returns the affected deployment
    /// ids.
    async fn decommission_device(
        &self,
        tenant_id: Uuid,
        device_id: &str,
        finished_at: OffsetDateTime,
    ) -> MetadataResult<Vec<Uuid>>;

    /// List device deployments in insertion order, paginated.
    async fn list_device_deployments(
        &self,
        tenant_id: Uuid,
        deployment_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> MetadataResult<Vec<DeviceDeploymentRow>>;

    /// Count device deployments owned by a deployment.
    async fn count_device_deployments(
        &self,
        tenant_id: Uuid,
        deployment_id: Uuid,
    ) -> MetadataResult<i64>;

    /// Flag that a deployment log exists for this device.
    async fn set_log_available(
        &self,
        tenant_id: Uuid,
        deployment_id: Uuid,
        device_id: &str,
    ) -> MetadataResult<()>;
}
