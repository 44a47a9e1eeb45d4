//! Internal API handlers: tenant provisioning, storage settings and
//! device decommissioning.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use hangar_core::ids::{DeviceId, TenantId};
use hangar_metadata::models::{StorageSettingsRow, TenantRow};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub tenant_id: String,
}

/// POST /tenants - provision a tenant.
#[tracing::instrument(skip(state))]
pub async fn create_tenant(
    State(state): State<AppState>,
    Json(body): Json<CreateTenantRequest>,
) -> ApiResult<StatusCode> {
    let tenant = TenantId::parse(&body.tenant_id)?;
    state
        .metadata
        .ensure_tenant(&TenantRow {
            tenant_id: *tenant.as_uuid(),
            created_at: OffsetDateTime::now_utc(),
        })
        .await?;
    Ok(StatusCode::CREATED)
}

/// Storage settings payload, as stored per tenant.
#[derive(Debug, Serialize, Deserialize)]
pub struct StorageSettings {
    pub bucket: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

impl StorageSettings {
    fn validate(&self) -> ApiResult<()> {
        if self.bucket.is_empty() {
            return Err(ApiError::InvalidInput("bucket is required".to_string()));
        }
        if self.region.is_empty() {
            return Err(ApiError::InvalidInput("region is required".to_string()));
        }
        Ok(())
    }
}

/// GET /tenants/{id}/storage/settings - read storage settings.
pub async fn get_storage_settings(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<StorageSettings>> {
    let tenant = TenantId::parse(&tenant_id)?;
    let row = state
        .metadata
        .get_storage_settings(*tenant.as_uuid())
        .await?
        .ok_or_else(|| ApiError::NotFound("no storage settings configured".to_string()))?;
    Ok(Json(StorageSettings {
        bucket: row.bucket,
        region: row.region,
        uri: row.uri,
        key: row.access_key_id,
        secret: row.secret_access_key,
        force_path_style: row.force_path_style,
    }))
}

/// PUT /tenants/{id}/storage/settings - replace storage settings.
#[tracing::instrument(skip(state, settings))]
pub async fn put_storage_settings(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Json(settings): Json<StorageSettings>,
) -> ApiResult<StatusCode> {
    let tenant = TenantId::parse(&tenant_id)?;
    settings.validate()?;
    state
        .metadata
        .put_storage_settings(&StorageSettingsRow {
            tenant_id: *tenant.as_uuid(),
            bucket: settings.bucket,
            region: settings.region,
            uri: settings.uri,
            access_key_id: settings.key,
            secret_access_key: settings.secret,
            force_path_style: settings.force_path_style,
            updated_at: OffsetDateTime::now_utc(),
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /tenants/{tenant_id}/devices/{device_id} - decommission a device.
#[tracing::instrument(skip(state))]
pub async fn decommission_device(
    State(state): State<AppState>,
    Path((tenant_id, device_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let tenant = TenantId::parse(&tenant_id)?;
    let device_id = DeviceId::parse(&device_id)?;
    state
        .deployments
        .decommission_device(tenant, &device_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /health - liveness and storage health.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state
        .metadata
        .health_check()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}
