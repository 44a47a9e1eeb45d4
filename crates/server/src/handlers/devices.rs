//! Device-facing API handlers.

use crate::deployments::DeploymentInstructions;
use crate::error::ApiResult;
use crate::handlers::common::{device_from_headers, tenant_from_headers};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use hangar_core::ids::DeploymentId;
use hangar_core::{InstalledArtifact, LogMessage, StatusReport};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub artifact_name: String,
    pub device_type: Option<String>,
}

/// GET /device/deployments/next - poll for the next deployment.
///
/// Responds 200 with instructions, or 204 when no update applies.
#[tracing::instrument(skip(state, headers))]
pub async fn next_deployment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
) -> ApiResult<Response> {
    let tenant = tenant_from_headers(&headers)?;
    let device_id = device_from_headers(&headers)?;
    let installed = InstalledArtifact {
        artifact_name: query.artifact_name,
        device_type: query.device_type.unwrap_or_default(),
    };

    let assignment: Option<DeploymentInstructions> = state
        .deployments
        .next_deployment(tenant, &device_id, &installed)
        .await?;

    Ok(match assignment {
        Some(instructions) => (StatusCode::OK, Json(instructions)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// PUT /device/deployments/{id}/status - report update progress.
#[tracing::instrument(skip(state, headers, report))]
pub async fn report_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(deployment_id): Path<String>,
    Json(report): Json<StatusReport>,
) -> ApiResult<StatusCode> {
    let tenant = tenant_from_headers(&headers)?;
    let device_id = device_from_headers(&headers)?;
    let deployment_id = DeploymentId::parse(&deployment_id)?;
    state
        .deployments
        .update_device_status(tenant, deployment_id, &device_id, &report)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct LogBatch {
    pub messages: Vec<LogMessage>,
}

/// PUT /device/deployments/{id}/log - append deployment log messages.
#[tracing::instrument(skip(state, headers, batch))]
pub async fn upload_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(deployment_id): Path<String>,
    Json(batch): Json<LogBatch>,
) -> ApiResult<StatusCode> {
    let tenant = tenant_from_headers(&headers)?;
    let device_id = device_from_headers(&headers)?;
    let deployment_id = DeploymentId::parse(&deployment_id)?;
    state
        .deployments
        .save_device_log(tenant, deployment_id, &device_id, batch.messages)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
