//! Management API handlers for deployments.

use crate::deployments::DeploymentView;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::tenant_from_headers;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use hangar_core::ids::{DeploymentId, DeviceId};
use hangar_core::{ConfigurationDeploymentConstructor, DeploymentConstructor, Stats};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

/// POST /deployments - create a software deployment.
#[tracing::instrument(skip(state, headers, constructor))]
pub async fn create_deployment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(constructor): Json<DeploymentConstructor>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let tenant = tenant_from_headers(&headers)?;
    let id = state
        .deployments
        .create_deployment(tenant, &constructor)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: id.to_string() })))
}

/// POST /deployments/configuration/{device_id}/{deployment_id} - create a
/// configuration deployment under a caller-supplied identity.
#[tracing::instrument(skip(state, headers, constructor))]
pub async fn create_configuration_deployment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((device_id, deployment_id)): Path<(String, String)>,
    Json(constructor): Json<ConfigurationDeploymentConstructor>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let tenant = tenant_from_headers(&headers)?;
    let device_id = DeviceId::parse(&device_id)?;
    let deployment_id = DeploymentId::parse(&deployment_id)?;
    state
        .deployments
        .create_configuration_deployment(tenant, deployment_id, &device_id, &constructor)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: deployment_id.to_string(),
        }),
    ))
}

/// GET /deployments - list deployments.
pub async fn list_deployments(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<DeploymentView>>> {
    let tenant = tenant_from_headers(&headers)?;
    Ok(Json(state.deployments.list_deployments(tenant).await?))
}

/// GET /deployments/{id} - show one deployment.
pub async fn show_deployment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(deployment_id): Path<String>,
) -> ApiResult<Json<DeploymentView>> {
    let tenant = tenant_from_headers(&headers)?;
    let deployment_id = DeploymentId::parse(&deployment_id)?;
    Ok(Json(
        state.deployments.get_deployment(tenant, deployment_id).await?,
    ))
}

/// GET /deployments/{id}/statistics - aggregate status counters.
pub async fn deployment_statistics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(deployment_id): Path<String>,
) -> ApiResult<Json<Stats>> {
    let tenant = tenant_from_headers(&headers)?;
    let deployment_id = DeploymentId::parse(&deployment_id)?;
    Ok(Json(
        state
            .deployments
            .deployment_stats(tenant, deployment_id)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct DeviceListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// GET /deployments/{id}/devices - paginated per-device statuses.
pub async fn list_deployment_devices(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(deployment_id): Path<String>,
    Query(query): Query<DeviceListQuery>,
) -> ApiResult<Response> {
    let tenant = tenant_from_headers(&headers)?;
    let deployment_id = DeploymentId::parse(&deployment_id)?;
    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(hangar_core::DEFAULT_PER_PAGE);

    let result = state
        .deployments
        .list_device_deployments(tenant, deployment_id, page, per_page)
        .await?;

    let mut response = Json(result.items).into_response();
    response.headers_mut().insert(
        "x-total-count",
        result
            .total
            .to_string()
            .parse()
            .expect("count is a valid header value"),
    );
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct AbortRequest {
    pub status: String,
}

/// PUT /deployments/{id}/status - abort a deployment.
#[tracing::instrument(skip(state, headers))]
pub async fn abort_deployment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(deployment_id): Path<String>,
    Json(body): Json<AbortRequest>,
) -> ApiResult<StatusCode> {
    let tenant = tenant_from_headers(&headers)?;
    let deployment_id = DeploymentId::parse(&deployment_id)?;
    if body.status != "aborted" {
        return Err(ApiError::InvalidInput(format!(
            "unsupported deployment status '{}'",
            body.status
        )));
    }
    state
        .deployments
        .abort_deployment(tenant, deployment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /deployments/{id}/devices/{device_id}/log - device log as text.
pub async fn get_device_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((deployment_id, device_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let tenant = tenant_from_headers(&headers)?;
    let deployment_id = DeploymentId::parse(&deployment_id)?;
    let device_id = DeviceId::parse(&device_id)?;
    let text = state
        .deployments
        .get_device_log(tenant, deployment_id, &device_id)
        .await?;
    Ok((
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text,
    )
        .into_response())
}
