//! Deployment orchestration engine.
//!
//! Owns the deployment lifecycle, the per-device assignment decision and
//! the status tracking rules. Handlers stay thin wrappers around this
//! type.

use crate::directory::DeviceDirectory;
use crate::error::{ApiError, ApiResult};
use crate::introspect::{ArtifactIntrospector, payload_checksum};
use crate::metrics;
use hangar_core::config::AppConfig;
use hangar_core::ids::{ArtifactId, DeploymentId, DeviceId, TenantId, UploadId};
use hangar_core::{
    Artifact, ArtifactMeta, ConfigurationDeploymentConstructor, Deployment,
    DeploymentConstructor, DeploymentKind, DeploymentStatus, DeviceStatus, InstalledArtifact,
    Link, LogMessage, Stats, StatusReport, Transition, Update, UpdateType, verify_transition,
};
use hangar_metadata::MetadataStore;
use hangar_metadata::models::{
    ArtifactRow, DeploymentRow, DeploymentStatRow, DeviceDeploymentRow, LogMessageRow,
    ReleaseNoteRow, UploadIntentRow,
};
use hangar_signer::{DownloadClaims, LinkSigner};
use hangar_storage::{ObjectStore, StorageError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Request path covered by download link signatures.
pub const DOWNLOAD_PATH: &str = "/api/devices/v1/deployments/download";

/// Bounded retries when a conditional update loses to a concurrent writer.
const TRANSITION_RETRIES: usize = 3;

/// Update instructions handed to a polling device.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeploymentInstructions {
    pub id: DeploymentId,
    pub artifact: ArtifactInstructions,
}

/// The artifact part of an assignment, with its signed source link.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactInstructions {
    pub artifact_name: String,
    pub source: Link,
    pub device_types_compatible: Vec<String>,
}

/// Management view of a deployment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeploymentView {
    pub id: DeploymentId,
    pub name: String,
    pub artifact_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub finished: Option<OffsetDateTime>,
    pub status: DeploymentStatus,
    pub device_count: i64,
}

/// Management view of a single device within a deployment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceDeploymentView {
    pub id: Uuid,
    pub device_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substate: Option<String>,
    pub log: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub finished: Option<OffsetDateTime>,
}

/// A page of device deployments plus the total count.
#[derive(Clone, Debug)]
pub struct DevicePage {
    pub items: Vec<DeviceDeploymentView>,
    pub total: i64,
}

/// The deployment orchestration engine.
///
/// Stateless over its collaborators: any number of polls and management
/// calls may run concurrently; per-device consistency comes from the
/// metadata store's conditional updates, not from locks here.
pub struct Deployments {
    config: Arc<AppConfig>,
    metadata: Arc<dyn MetadataStore>,
    storage: Arc<dyn ObjectStore>,
    signer: Arc<LinkSigner>,
    introspector: Arc<dyn ArtifactIntrospector>,
    directory: Arc<dyn DeviceDirectory>,
}

impl Deployments {
    pub fn new(
        config: Arc<AppConfig>,
        metadata: Arc<dyn MetadataStore>,
        storage: Arc<dyn ObjectStore>,
        signer: Arc<LinkSigner>,
        introspector: Arc<dyn ArtifactIntrospector>,
        directory: Arc<dyn DeviceDirectory>,
    ) -> Self {
        Self {
            config,
            metadata,
            storage,
            signer,
            introspector,
            directory,
        }
    }

    // =========================================================================
    // Deployment lifecycle
    // =========================================================================

    /// Create a software deployment, seeding one pending device
    /// deployment per target device.
    pub async fn create_deployment(
        &self,
        tenant: TenantId,
        constructor: &DeploymentConstructor,
    ) -> ApiResult<DeploymentId> {
        constructor.validate()?;

        // "Name never uploaded" is unsatisfiable; a device-type mismatch
        // is resolved lazily at poll time instead.
        if !self
            .metadata
            .artifact_name_exists(*tenant.as_uuid(), &constructor.artifact_name)
            .await?
        {
            return Err(ApiError::Unprocessable(format!(
                "no artifact named '{}' exists",
                constructor.artifact_name
            )));
        }

        let deployment = Deployment::from_constructor(constructor);
        let row = deployment_row(tenant, &deployment);
        let mut devices = Vec::with_capacity(constructor.devices.len());
        for (position, device_id) in constructor.devices.iter().enumerate() {
            let device_type = self.directory.device_type(tenant, device_id).await;
            devices.push(device_deployment_row(
                tenant,
                deployment.id,
                device_id,
                position as i64,
                device_type,
            ));
        }

        self.metadata.create_deployment(&row, &devices).await?;
        metrics::DEPLOYMENTS_CREATED.inc();
        tracing::info!(
            deployment_id = %deployment.id,
            devices = devices.len(),
            artifact_name = %constructor.artifact_name,
            "deployment created"
        );
        Ok(deployment.id)
    }

    /// Create a configuration deployment under a caller-supplied
    /// (deployment, device) identity. A duplicate identity is a conflict.
    pub async fn create_configuration_deployment(
        &self,
        tenant: TenantId,
        deployment_id: DeploymentId,
        device_id: &DeviceId,
        constructor: &ConfigurationDeploymentConstructor,
    ) -> ApiResult<()> {
        constructor.validate()?;

        let deployment = Deployment::from_configuration_constructor(deployment_id, constructor);
        let row = deployment_row(tenant, &deployment);
        let device_type = self.directory.device_type(tenant, device_id).await;
        let devices = vec![device_deployment_row(
            tenant,
            deployment_id,
            device_id,
            0,
            device_type,
        )];

        self.metadata
            .create_deployment(&row, &devices)
            .await
            .map_err(|e| match e {
                hangar_metadata::MetadataError::AlreadyExists(_) => ApiError::Conflict(format!(
                    "configuration deployment {deployment_id} already exists for device {device_id}"
                )),
                other => other.into(),
            })?;
        metrics::DEPLOYMENTS_CREATED.inc();
        Ok(())
    }

    /// Show a deployment.
    pub async fn get_deployment(
        &self,
        tenant: TenantId,
        deployment_id: DeploymentId,
    ) -> ApiResult<DeploymentView> {
        let row = self.require_deployment(tenant, deployment_id).await?;
        let stats = self.stats(tenant, deployment_id).await?;
        Ok(deployment_view(&row, &stats))
    }

    /// List deployments, newest first.
    pub async fn list_deployments(&self, tenant: TenantId) -> ApiResult<Vec<DeploymentView>> {
        let rows = self.metadata.list_deployments(*tenant.as_uuid()).await?;
        let mut views = Vec::with_capacity(rows.len());
        for row in rows {
            let stats = self.stats(tenant, DeploymentId::from(row.deployment_id)).await?;
            views.push(deployment_view(&row, &stats));
        }
        Ok(views)
    }

    /// Read the aggregate statistics of a deployment.
    pub async fn deployment_stats(
        &self,
        tenant: TenantId,
        deployment_id: DeploymentId,
    ) -> ApiResult<Stats> {
        self.require_deployment(tenant, deployment_id).await?;
        self.stats(tenant, deployment_id).await
    }

    /// Abort a deployment: every still-active device is forced to
    /// `aborted` and the deployment finishes immediately.
    pub async fn abort_deployment(
        &self,
        tenant: TenantId,
        deployment_id: DeploymentId,
    ) -> ApiResult<()> {
        let row = self.require_deployment(tenant, deployment_id).await?;
        if row.finished_at.is_some() {
            return Err(ApiError::AlreadyFinished);
        }

        let aborted = self
            .metadata
            .abort_device_deployments(
                *tenant.as_uuid(),
                *deployment_id.as_uuid(),
                OffsetDateTime::now_utc(),
            )
            .await?;
        metrics::DEPLOYMENTS_ABORTED.inc();
        tracing::info!(deployment_id = %deployment_id, aborted, "deployment aborted");
        Ok(())
    }

    /// Force every active device deployment of a removed device to
    /// `decommissioned`, across deployments.
    pub async fn decommission_device(
        &self,
        tenant: TenantId,
        device_id: &DeviceId,
    ) -> ApiResult<()> {
        let affected = self
            .metadata
            .decommission_device(
                *tenant.as_uuid(),
                device_id.as_str(),
                OffsetDateTime::now_utc(),
            )
            .await?;
        tracing::info!(
            device_id = %device_id,
            deployments = affected.len(),
            "device decommissioned"
        );
        Ok(())
    }

    /// List per-device statuses, in insertion order.
    pub async fn list_device_deployments(
        &self,
        tenant: TenantId,
        deployment_id: DeploymentId,
        page: i64,
        per_page: i64,
    ) -> ApiResult<DevicePage> {
        if page < 1 || per_page < 1 || per_page > hangar_core::MAX_PER_PAGE {
            return Err(ApiError::InvalidInput(format!(
                "page must be >= 1 and per_page between 1 and {}",
                hangar_core::MAX_PER_PAGE
            )));
        }
        self.require_deployment(tenant, deployment_id).await?;

        let offset = (page - 1) * per_page;
        let rows = self
            .metadata
            .list_device_deployments(
                *tenant.as_uuid(),
                *deployment_id.as_uuid(),
                offset,
                per_page,
            )
            .await?;
        let total = self
            .metadata
            .count_device_deployments(*tenant.as_uuid(), *deployment_id.as_uuid())
            .await?;

        Ok(DevicePage {
            items: rows.iter().map(device_view).collect(),
            total,
        })
    }

    // =========================================================================
    // Device assignment
    // =========================================================================

    /// Decide the next deployment for a polling device.
    ///
    /// Returns `None` when no update applies. The decide-and-transition
    /// step uses the same conditional update discipline as status
    /// reports, so a concurrent poll observes either the pre- or
    /// post-transition state, never a torn one.
    pub async fn next_deployment(
        &self,
        tenant: TenantId,
        device_id: &DeviceId,
        installed: &InstalledArtifact,
    ) -> ApiResult<Option<DeploymentInstructions>> {
        installed.validate()?;

        for _attempt in 0..TRANSITION_RETRIES {
            let Some(device_deployment) = self
                .metadata
                .find_oldest_active_for_device(*tenant.as_uuid(), device_id.as_str())
                .await?
            else {
                return Ok(None);
            };

            let deployment_id = DeploymentId::from(device_deployment.deployment_id);
            let deployment = self.require_deployment(tenant, deployment_id).await?;
            let status = parse_status(&device_deployment.status)?;

            if status != DeviceStatus::Pending {
                // In-flight: re-issue the same assignment, signed afresh.
                return self
                    .reissue_assignment(tenant, &deployment, &device_deployment, installed)
                    .await
                    .map(Some);
            }

            if deployment.kind == "configuration" {
                self.ensure_configuration_artifact(tenant, &deployment, &installed.device_type)
                    .await?;
            }

            let artifact = self
                .metadata
                .artifact_by_name_and_device_type(
                    *tenant.as_uuid(),
                    &deployment.artifact_name,
                    &installed.device_type,
                )
                .await?;

            let Some(artifact) = artifact else {
                // No artifact fits this device type: terminal side entry.
                if self
                    .settle_pending(tenant, deployment_id, device_id, DeviceStatus::NoArtifact)
                    .await?
                {
                    return Ok(None);
                }
                continue;
            };

            if !installed.artifact_name.is_empty()
                && installed.artifact_name == deployment.artifact_name
            {
                if self
                    .settle_pending(tenant, deployment_id, device_id, DeviceStatus::AlreadyInstalled)
                    .await?
                {
                    return Ok(None);
                }
                continue;
            }

            // Record the assignment; the status stays pending until the
            // device reports progress.
            self.metadata
                .assign_artifact(
                    *tenant.as_uuid(),
                    *deployment_id.as_uuid(),
                    device_id.as_str(),
                    artifact.artifact_id,
                    &installed.device_type,
                )
                .await?;

            let artifact = artifact_from_row(artifact)?;
            let instructions = self
                .sign_instructions(tenant, deployment_id, device_id, installed, &artifact)
                .await?;
            metrics::ASSIGNMENTS_ISSUED.inc();
            return Ok(Some(instructions));
        }

        Err(ApiError::Conflict(
            "assignment lost repeatedly to concurrent status updates".to_string(),
        ))
    }

    /// Re-issue the assignment for an in-flight device deployment.
    async fn reissue_assignment(
        &self,
        tenant: TenantId,
        deployment: &DeploymentRow,
        device_deployment: &DeviceDeploymentRow,
        installed: &InstalledArtifact,
    ) -> ApiResult<DeploymentInstructions> {
        // Devices must poll with a consistent type per outstanding
        // deployment.
        if let Some(recorded) = &device_deployment.device_type
            && recorded != &installed.device_type
        {
            return Err(ApiError::Conflict(format!(
                "device type changed mid-deployment: recorded '{recorded}', got '{}'",
                installed.device_type
            )));
        }

        let artifact_row = match device_deployment.artifact_id {
            Some(artifact_id) => self
                .metadata
                .get_artifact(*tenant.as_uuid(), artifact_id)
                .await?
                .ok_or_else(|| {
                    ApiError::Internal(format!("assigned artifact {artifact_id} disappeared"))
                })?,
            None => self
                .metadata
                .artifact_by_name_and_device_type(
                    *tenant.as_uuid(),
                    &deployment.artifact_name,
                    &installed.device_type,
                )
                .await?
                .ok_or_else(|| {
                    ApiError::Internal(format!(
                        "in-flight deployment {} has no resolvable artifact",
                        deployment.deployment_id
                    ))
                })?,
        };

        let artifact = artifact_from_row(artifact_row)?;
        let device_id = DeviceId::parse(&device_deployment.device_id)?;
        let instructions = self
            .sign_instructions(
                tenant,
                DeploymentId::from(deployment.deployment_id),
                &device_id,
                installed,
                &artifact,
            )
            .await?;
        metrics::ASSIGNMENTS_ISSUED.inc();
        Ok(instructions)
    }

    /// Move a pending device deployment to a server-assigned terminal
    /// side entry. Returns `false` when a concurrent writer moved the
    /// status first.
    async fn settle_pending(
        &self,
        tenant: TenantId,
        deployment_id: DeploymentId,
        device_id: &DeviceId,
        to: DeviceStatus,
    ) -> ApiResult<bool> {
        let won = self
            .metadata
            .transition_device_status(
                *tenant.as_uuid(),
                *deployment_id.as_uuid(),
                device_id.as_str(),
                DeviceStatus::Pending.as_str(),
                to.as_str(),
                None,
                Some(OffsetDateTime::now_utc()),
            )
            .await?;
        Ok(won)
    }

    async fn sign_instructions(
        &self,
        tenant: TenantId,
        deployment_id: DeploymentId,
        device_id: &DeviceId,
        installed: &InstalledArtifact,
        artifact: &Artifact,
    ) -> ApiResult<DeploymentInstructions> {
        let claims = DownloadClaims {
            tenant,
            deployment_id,
            device_id: device_id.clone(),
            device_type: installed.device_type.clone(),
            artifact_id: artifact.id,
            expire: OffsetDateTime::now_utc() + self.config.download.expire(),
        };
        let link = self
            .signer
            .sign(&self.config.server.base_url, DOWNLOAD_PATH, &claims)?;
        Ok(DeploymentInstructions {
            id: deployment_id,
            artifact: ArtifactInstructions {
                artifact_name: artifact.name.clone(),
                source: link,
                device_types_compatible: artifact.device_types_compatible.clone(),
            },
        })
    }

    /// Verify the query parameters of a download request.
    pub fn verify_download(
        &self,
        params: &std::collections::HashMap<String, String>,
    ) -> Result<DownloadClaims, hangar_signer::SignerError> {
        self.signer.verify(DOWNLOAD_PATH, params)
    }

    /// Resolve a verified download link to the backing object location.
    pub async fn resolve_download(&self, claims: &DownloadClaims) -> ApiResult<String> {
        let artifact = self
            .metadata
            .get_artifact(*claims.tenant.as_uuid(), *claims.artifact_id.as_uuid())
            .await?
            .ok_or_else(|| ApiError::NotFound("artifact not found".to_string()))?;
        let object_key = artifact
            .object_key
            .ok_or_else(|| ApiError::NotFound("artifact has no stored payload".to_string()))?;
        let location = self
            .storage
            .presign_get(&object_key, std::time::Duration::from_secs(300))
            .await?;
        Ok(location)
    }

    // =========================================================================
    // Status tracking
    // =========================================================================

    /// Record a device-reported status transition, moving the aggregate
    /// counters bucket-to-bucket and finishing the deployment when the
    /// last device lands in a terminal status.
    pub async fn update_device_status(
        &self,
        tenant: TenantId,
        deployment_id: DeploymentId,
        device_id: &DeviceId,
        report: &StatusReport,
    ) -> ApiResult<()> {
        report.validate()?;

        for _attempt in 0..TRANSITION_RETRIES {
            let current = self
                .metadata
                .get_device_deployment(
                    *tenant.as_uuid(),
                    *deployment_id.as_uuid(),
                    device_id.as_str(),
                )
                .await?
                .ok_or_else(|| {
                    ApiError::NotFound(format!(
                        "no deployment {deployment_id} for device {device_id}"
                    ))
                })?;
            let status = parse_status(&current.status)?;

            match verify_transition(status, report.status) {
                // A duplicate of the current status (a retried report) is
                // accepted without touching the counters.
                Ok(Transition::Noop) => return Ok(()),
                Err(_) if status.is_terminal() => return Err(ApiError::AlreadyFinished),
                Err(e) => return Err(e.into()),
                Ok(Transition::Apply) => {}
            }

            let finished_at = report
                .status
                .is_terminal()
                .then(OffsetDateTime::now_utc);
            let won = self
                .metadata
                .transition_device_status(
                    *tenant.as_uuid(),
                    *deployment_id.as_uuid(),
                    device_id.as_str(),
                    status.as_str(),
                    report.status.as_str(),
                    report.substate.as_deref(),
                    finished_at,
                )
                .await?;
            if won {
                metrics::STATUS_REPORTS
                    .with_label_values(&[report.status.as_str()])
                    .inc();
                tracing::debug!(
                    deployment_id = %deployment_id,
                    device_id = %device_id,
                    from = %status,
                    to = %report.status,
                    "device status updated"
                );
                return Ok(());
            }
            // Lost the conditional update; re-read and re-decide.
        }

        Err(ApiError::Conflict(
            "status update lost repeatedly to concurrent reports".to_string(),
        ))
    }

    // =========================================================================
    // Device deployment logs
    // =========================================================================

    /// Append a batch of log messages for a device within a deployment.
    pub async fn save_device_log(
        &self,
        tenant: TenantId,
        deployment_id: DeploymentId,
        device_id: &DeviceId,
        messages: Vec<LogMessage>,
    ) -> ApiResult<()> {
        let log = hangar_core::DeploymentLog {
            device_id: device_id.clone(),
            deployment_id,
            messages,
        };
        log.validate()?;

        self.metadata
            .get_device_deployment(
                *tenant.as_uuid(),
                *deployment_id.as_uuid(),
                device_id.as_str(),
            )
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "no deployment {deployment_id} for device {device_id}"
                ))
            })?;

        let rows: Vec<LogMessageRow> = log
            .messages
            .iter()
            .map(|m| LogMessageRow {
                tenant_id: *tenant.as_uuid(),
                deployment_id: *deployment_id.as_uuid(),
                device_id: device_id.as_str().to_string(),
                seq: 0, // assigned on insert
                level: m.level.clone(),
                message: m.message.clone(),
                created_at: m.timestamp,
            })
            .collect();
        self.metadata.append_log_messages(&rows).await?;
        self.metadata
            .set_log_available(
                *tenant.as_uuid(),
                *deployment_id.as_uuid(),
                device_id.as_str(),
            )
            .await?;
        Ok(())
    }

    /// Read a device's deployment log as plain text.
    pub async fn get_device_log(
        &self,
        tenant: TenantId,
        deployment_id: DeploymentId,
        device_id: &DeviceId,
    ) -> ApiResult<String> {
        let rows = self
            .metadata
            .get_log_messages(
                *tenant.as_uuid(),
                *deployment_id.as_uuid(),
                device_id.as_str(),
            )
            .await?;
        if rows.is_empty() {
            return Err(ApiError::NotFound(format!(
                "no log for device {device_id} in deployment {deployment_id}"
            )));
        }
        let log = hangar_core::DeploymentLog {
            device_id: device_id.clone(),
            deployment_id,
            messages: rows
                .into_iter()
                .map(|r| LogMessage {
                    level: r.level,
                    message: r.message,
                    timestamp: r.created_at,
                })
                .collect(),
        };
        Ok(log.render())
    }

    // =========================================================================
    // Artifact catalog
    // =========================================================================

    /// Ingest an uploaded artifact payload: introspect, store, catalog.
    pub async fn create_artifact(
        &self,
        tenant: TenantId,
        description: Option<String>,
        payload: bytes::Bytes,
    ) -> ApiResult<ArtifactId> {
        let meta = self
            .introspector
            .inspect(&payload)
            .await
            .map_err(ApiError::InvalidArtifact)?;

        let artifact_id = ArtifactId::new();
        let object_key = artifact_object_key(tenant, artifact_id);
        self.storage.put(&object_key, payload.clone()).await?;

        let row = artifact_row_from_meta(
            tenant,
            artifact_id,
            &meta,
            description,
            payload.len() as i64,
            payload_checksum(&payload),
            Some(object_key),
        )?;
        self.metadata.create_artifact(&row).await?;
        tracing::info!(artifact_id = %artifact_id, artifact_name = %meta.name, "artifact created");
        Ok(artifact_id)
    }

    /// Show an artifact.
    pub async fn get_artifact(
        &self,
        tenant: TenantId,
        artifact_id: ArtifactId,
    ) -> ApiResult<Artifact> {
        let row = self
            .metadata
            .get_artifact(*tenant.as_uuid(), *artifact_id.as_uuid())
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("artifact {artifact_id} not found")))?;
        artifact_from_row(row)
    }

    /// List artifacts, optionally by exact name.
    pub async fn list_artifacts(
        &self,
        tenant: TenantId,
        name: Option<&str>,
    ) -> ApiResult<Vec<Artifact>> {
        let rows = self.metadata.list_artifacts(*tenant.as_uuid(), name).await?;
        rows.into_iter().map(artifact_from_row).collect()
    }

    /// Delete an artifact, unless an unfinished deployment references its
    /// name.
    pub async fn delete_artifact(
        &self,
        tenant: TenantId,
        artifact_id: ArtifactId,
    ) -> ApiResult<()> {
        let row = self
            .metadata
            .get_artifact(*tenant.as_uuid(), *artifact_id.as_uuid())
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("artifact {artifact_id} not found")))?;

        if self
            .metadata
            .artifact_name_in_active_deployment(*tenant.as_uuid(), &row.artifact_name)
            .await?
        {
            return Err(ApiError::Conflict(format!(
                "artifact '{}' is referenced by an unfinished deployment",
                row.artifact_name
            )));
        }

        if let Some(object_key) = &row.object_key {
            match self.storage.delete(object_key).await {
                Ok(()) | Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.metadata
            .delete_artifact(*tenant.as_uuid(), *artifact_id.as_uuid())
            .await?;
        Ok(())
    }

    /// List releases, optionally filtered by name, with notes attached.
    pub async fn list_releases(
        &self,
        tenant: TenantId,
        name: Option<&str>,
    ) -> ApiResult<Vec<hangar_core::Release>> {
        let artifacts = self.list_artifacts(tenant, name).await?;
        let mut releases = hangar_core::group_releases(artifacts);
        for release in &mut releases {
            if let Some(notes) = self
                .metadata
                .get_release_notes(*tenant.as_uuid(), &release.name)
                .await?
            {
                release.notes = Some(hangar_core::ReleaseNotes(notes.notes));
            }
        }
        Ok(releases)
    }

    /// Replace the notes of a release.
    pub async fn put_release_notes(
        &self,
        tenant: TenantId,
        release_name: &str,
        notes: hangar_core::ReleaseNotes,
    ) -> ApiResult<()> {
        notes.validate()?;
        if !self
            .metadata
            .artifact_name_exists(*tenant.as_uuid(), release_name)
            .await?
        {
            return Err(ApiError::NotFound(format!(
                "release '{release_name}' not found"
            )));
        }
        self.metadata
            .put_release_notes(&ReleaseNoteRow {
                tenant_id: *tenant.as_uuid(),
                release_name: release_name.to_string(),
                notes: notes.0,
                updated_at: OffsetDateTime::now_utc(),
            })
            .await?;
        Ok(())
    }

    // =========================================================================
    // Direct upload
    // =========================================================================

    /// Issue a pre-signed upload URL and record the intent.
    pub async fn request_direct_upload(&self, tenant: TenantId) -> ApiResult<(UploadId, Link)> {
        let upload_id = UploadId::new();
        let object_key = upload_object_key(tenant, upload_id);
        let expire = self.config.download.expire();
        let uri = self
            .storage
            .presign_put(
                &object_key,
                std::time::Duration::from_secs(expire.whole_seconds().max(0) as u64),
            )
            .await?;

        let now = OffsetDateTime::now_utc();
        self.metadata
            .create_intent(&UploadIntentRow {
                upload_id: *upload_id.as_uuid(),
                tenant_id: *tenant.as_uuid(),
                status: hangar_core::UploadStatus::Pending.as_str().to_string(),
                object_key,
                metadata: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        Ok((upload_id, Link::new(uri, now + expire)))
    }

    /// Mark a direct upload complete and start ingestion. The artifact
    /// appears asynchronously; callers poll the catalog for it.
    pub async fn complete_direct_upload(
        &self,
        tenant: TenantId,
        upload_id: UploadId,
        metadata: Option<serde_json::Value>,
    ) -> ApiResult<()> {
        let intent = self
            .metadata
            .get_intent(*tenant.as_uuid(), *upload_id.as_uuid())
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("upload {upload_id} not found")))?;

        if intent.status != hangar_core::UploadStatus::Pending.as_str() {
            return Err(ApiError::Conflict(format!(
                "upload {upload_id} was already completed"
            )));
        }

        let metadata_json = metadata
            .map(|m| serde_json::to_string(&m))
            .transpose()
            .map_err(|e| ApiError::InvalidInput(format!("unreadable metadata: {e}")))?;
        let advanced = self
            .metadata
            .transition_intent_status(
                *tenant.as_uuid(),
                *upload_id.as_uuid(),
                hangar_core::UploadStatus::Pending.as_str(),
                hangar_core::UploadStatus::Processing.as_str(),
                metadata_json.as_deref(),
                OffsetDateTime::now_utc(),
            )
            .await?;
        if !advanced {
            return Err(ApiError::Conflict(format!(
                "upload {upload_id} was already completed"
            )));
        }
        Ok(())
    }

    /// Ingest a completed direct upload. On any failure the intent stays
    /// at its non-final marker; the caller-facing contract is to poll for
    /// the artifact and time out.
    pub async fn ingest_direct_upload(&self, tenant: TenantId, upload_id: UploadId) {
        if let Err(e) = self.try_ingest(tenant, upload_id).await {
            tracing::warn!(upload_id = %upload_id, error = %e, "direct upload ingestion failed");
        }
    }

    async fn try_ingest(&self, tenant: TenantId, upload_id: UploadId) -> ApiResult<()> {
        let intent = self
            .metadata
            .get_intent(*tenant.as_uuid(), *upload_id.as_uuid())
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("upload {upload_id} not found")))?;

        if !self.storage.exists(&intent.object_key).await? {
            return Err(ApiError::InvalidArtifact(
                "uploaded object never appeared in storage".to_string(),
            ));
        }

        let metadata_json = intent.metadata.ok_or_else(|| {
            ApiError::InvalidArtifact("completion carried no artifact metadata".to_string())
        })?;
        let value: serde_json::Value = serde_json::from_str(&metadata_json)
            .map_err(|e| ApiError::InvalidArtifact(format!("unreadable metadata: {e}")))?;
        let meta: ArtifactMeta = serde_json::from_value(value.clone())
            .map_err(|e| ApiError::InvalidArtifact(format!("incomplete metadata: {e}")))?;
        let size = value.get("size").and_then(|v| v.as_i64()).unwrap_or(0);
        let checksum = value
            .get("checksum")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let artifact_id = ArtifactId::new();
        let row = artifact_row_from_meta(
            tenant,
            artifact_id,
            &meta,
            None,
            size,
            checksum,
            Some(intent.object_key),
        )?;
        self.metadata.create_artifact(&row).await?;

        self.metadata
            .transition_intent_status(
                *tenant.as_uuid(),
                *upload_id.as_uuid(),
                hangar_core::UploadStatus::Processing.as_str(),
                hangar_core::UploadStatus::Done.as_str(),
                None,
                OffsetDateTime::now_utc(),
            )
            .await?;
        tracing::info!(upload_id = %upload_id, artifact_id = %artifact_id, "direct upload ingested");
        Ok(())
    }

    /// Show a direct-upload intent.
    pub async fn get_upload_intent(
        &self,
        tenant: TenantId,
        upload_id: UploadId,
    ) -> ApiResult<hangar_core::UploadIntent> {
        let row = self
            .metadata
            .get_intent(*tenant.as_uuid(), *upload_id.as_uuid())
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("upload {upload_id} not found")))?;
        Ok(hangar_core::UploadIntent {
            id: upload_id,
            status: hangar_core::UploadStatus::parse(&row.status)
                .map_err(|e| ApiError::Internal(e.to_string()))?,
            created: row.created_at,
            updated: row.updated_at,
            metadata: row
                .metadata
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .map_err(|e| ApiError::Internal(e.to_string()))?,
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn require_deployment(
        &self,
        tenant: TenantId,
        deployment_id: DeploymentId,
    ) -> ApiResult<DeploymentRow> {
        self.metadata
            .get_deployment(*tenant.as_uuid(), *deployment_id.as_uuid())
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("deployment {deployment_id} not found")))
    }

    async fn stats(&self, tenant: TenantId, deployment_id: DeploymentId) -> ApiResult<Stats> {
        let rows = self
            .metadata
            .deployment_stats(*tenant.as_uuid(), *deployment_id.as_uuid())
            .await?;
        Ok(stats_from_rows(&rows))
    }

    /// Materialize the generated artifact of a configuration deployment
    /// for the polling device's type, if it does not exist yet.
    async fn ensure_configuration_artifact(
        &self,
        tenant: TenantId,
        deployment: &DeploymentRow,
        device_type: &str,
    ) -> ApiResult<()> {
        if self
            .metadata
            .artifact_by_name_and_device_type(
                *tenant.as_uuid(),
                &deployment.artifact_name,
                device_type,
            )
            .await?
            .is_some()
        {
            return Ok(());
        }

        let payload = deployment.configuration.clone().ok_or_else(|| {
            ApiError::Internal(format!(
                "configuration deployment {} has no payload",
                deployment.deployment_id
            ))
        })?;

        let artifact_id = ArtifactId::new();
        let object_key = artifact_object_key(tenant, artifact_id);
        self.storage
            .put(&object_key, bytes::Bytes::from(payload.clone()))
            .await?;

        let meta = ArtifactMeta {
            name: deployment.artifact_name.clone(),
            description: String::new(),
            device_types_compatible: vec![device_type.to_string()],
            updates: vec![Update {
                type_info: UpdateType {
                    update_type: "configuration".to_string(),
                },
                files: None,
                provides: None,
                clears_provides: None,
            }],
        };
        let row = artifact_row_from_meta(
            tenant,
            artifact_id,
            &meta,
            None,
            payload.len() as i64,
            payload_checksum(&payload),
            Some(object_key),
        )?;
        self.metadata.create_artifact(&row).await?;
        Ok(())
    }
}

// =============================================================================
// Row conversions
// =============================================================================

fn parse_status(raw: &str) -> ApiResult<DeviceStatus> {
    DeviceStatus::parse(raw).map_err(|e| ApiError::Internal(e.to_string()))
}

fn deployment_row(tenant: TenantId, deployment: &Deployment) -> DeploymentRow {
    let (kind, configuration) = match &deployment.kind {
        DeploymentKind::Software => ("software".to_string(), None),
        DeploymentKind::Configuration { configuration } => {
            ("configuration".to_string(), Some(configuration.clone()))
        }
    };
    DeploymentRow {
        deployment_id: *deployment.id.as_uuid(),
        tenant_id: *tenant.as_uuid(),
        deployment_name: deployment.name.clone(),
        artifact_name: deployment.artifact_name.clone(),
        kind,
        configuration,
        created_at: deployment.created,
        finished_at: deployment.finished,
        max_devices: deployment.max_devices,
    }
}

fn device_deployment_row(
    tenant: TenantId,
    deployment_id: DeploymentId,
    device_id: &DeviceId,
    position: i64,
    device_type: Option<String>,
) -> DeviceDeploymentRow {
    DeviceDeploymentRow {
        id: Uuid::new_v4(),
        tenant_id: *tenant.as_uuid(),
        deployment_id: *deployment_id.as_uuid(),
        device_id: device_id.as_str().to_string(),
        status: DeviceStatus::Pending.as_str().to_string(),
        device_type,
        artifact_id: None,
        substate: None,
        log_available: false,
        position,
        created_at: OffsetDateTime::now_utc(),
        finished_at: None,
    }
}

fn stats_from_rows(rows: &[DeploymentStatRow]) -> Stats {
    let mut stats = Stats::new();
    for row in rows {
        if let Ok(status) = DeviceStatus::parse(&row.status) {
            stats.set(status, row.device_count);
        }
    }
    stats
}

fn deployment_view(row: &DeploymentRow, stats: &Stats) -> DeploymentView {
    let kind = match row.kind.as_str() {
        "configuration" => DeploymentKind::Configuration {
            configuration: row.configuration.clone().unwrap_or_default(),
        },
        _ => DeploymentKind::Software,
    };
    // An explicit finish (abort) takes precedence over the counters.
    let status = Deployment {
        id: DeploymentId::from(row.deployment_id),
        name: row.deployment_name.clone(),
        artifact_name: row.artifact_name.clone(),
        kind,
        created: row.created_at,
        finished: row.finished_at,
        max_devices: row.max_devices,
        stats: stats.clone(),
    }
    .status();
    DeploymentView {
        id: DeploymentId::from(row.deployment_id),
        name: row.deployment_name.clone(),
        artifact_name: row.artifact_name.clone(),
        kind: row.kind.clone(),
        created: row.created_at,
        finished: row.finished_at,
        status,
        device_count: row.max_devices,
    }
}

fn device_view(row: &DeviceDeploymentRow) -> DeviceDeploymentView {
    DeviceDeploymentView {
        id: row.id,
        device_id: row.device_id.clone(),
        status: row.status.clone(),
        device_type: row.device_type.clone(),
        substate: row.substate.clone(),
        log: row.log_available,
        created: row.created_at,
        finished: row.finished_at,
    }
}

fn artifact_from_row(row: ArtifactRow) -> ApiResult<Artifact> {
    let device_types_compatible: Vec<String> = serde_json::from_str(&row.device_types)
        .map_err(|e| ApiError::Internal(format!("corrupt device type set: {e}")))?;
    let updates: Vec<Update> = serde_json::from_str(&row.updates)
        .map_err(|e| ApiError::Internal(format!("corrupt update list: {e}")))?;
    Ok(Artifact {
        id: ArtifactId::from(row.artifact_id),
        name: row.artifact_name,
        description: row.description,
        size: row.size_bytes,
        checksum: row.checksum,
        device_types_compatible,
        updates,
        modified: row.modified_at,
    })
}

fn artifact_row_from_meta(
    tenant: TenantId,
    artifact_id: ArtifactId,
    meta: &ArtifactMeta,
    description: Option<String>,
    size: i64,
    checksum: String,
    object_key: Option<String>,
) -> ApiResult<ArtifactRow> {
    Ok(ArtifactRow {
        artifact_id: *artifact_id.as_uuid(),
        tenant_id: *tenant.as_uuid(),
        artifact_name: meta.name.clone(),
        description: description.unwrap_or_else(|| meta.description.clone()),
        size_bytes: size,
        checksum,
        device_types: serde_json::to_string(&meta.device_types_compatible)
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        updates: serde_json::to_string(&meta.updates)
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        object_key,
        modified_at: OffsetDateTime::now_utc(),
    })
}

fn artifact_object_key(tenant: TenantId, artifact_id: ArtifactId) -> String {
    format!("{tenant}/artifacts/{artifact_id}")
}

fn upload_object_key(tenant: TenantId, upload_id: UploadId) -> String {
    format!("{tenant}/uploads/{upload_id}")
}
