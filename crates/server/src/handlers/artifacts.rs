//! Artifact catalog and direct-upload handlers.

use crate::error::ApiResult;
use crate::handlers::common::tenant_from_headers;
use crate::handlers::management::CreatedResponse;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use hangar_core::ids::{ArtifactId, UploadId};
use hangar_core::{Artifact, Link};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ArtifactListQuery {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// GET /artifacts - list artifacts, optionally by exact name.
pub async fn list_artifacts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ArtifactListQuery>,
) -> ApiResult<Json<Vec<Artifact>>> {
    let tenant = tenant_from_headers(&headers)?;
    Ok(Json(
        state
            .deployments
            .list_artifacts(tenant, query.name.as_deref())
            .await?,
    ))
}

/// POST /artifacts - upload an artifact payload.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn upload_artifact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ArtifactListQuery>,
    payload: Bytes,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let tenant = tenant_from_headers(&headers)?;
    let id = state
        .deployments
        .create_artifact(tenant, query.description, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: id.to_string() })))
}

/// POST /artifacts/generate - generate an artifact from raw data.
///
/// Same ingestion path as a plain upload; the packaging difference lives
/// in the introspection tool.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn generate_artifact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ArtifactListQuery>,
    payload: Bytes,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let tenant = tenant_from_headers(&headers)?;
    let id = state
        .deployments
        .create_artifact(tenant, query.description, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: id.to_string() })))
}

/// GET /artifacts/{id} - show one artifact.
pub async fn show_artifact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(artifact_id): Path<String>,
) -> ApiResult<Json<Artifact>> {
    let tenant = tenant_from_headers(&headers)?;
    let artifact_id = ArtifactId::parse(&artifact_id)?;
    Ok(Json(state.deployments.get_artifact(tenant, artifact_id).await?))
}

/// DELETE /artifacts/{id} - delete an unreferenced artifact.
#[tracing::instrument(skip(state, headers))]
pub async fn delete_artifact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(artifact_id): Path<String>,
) -> ApiResult<StatusCode> {
    let tenant = tenant_from_headers(&headers)?;
    let artifact_id = ArtifactId::parse(&artifact_id)?;
    state.deployments.delete_artifact(tenant, artifact_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct DirectUploadResponse {
    pub id: String,
    pub link: Link,
}

/// POST /artifacts/directupload - issue a pre-signed upload URL.
#[tracing::instrument(skip(state, headers))]
pub async fn request_direct_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<DirectUploadResponse>> {
    let tenant = tenant_from_headers(&headers)?;
    let (id, link) = state.deployments.request_direct_upload(tenant).await?;
    Ok(Json(DirectUploadResponse {
        id: id.to_string(),
        link,
    }))
}

/// GET /artifacts/directupload/{id} - show a direct-upload intent.
pub async fn show_direct_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<hangar_core::UploadIntent>> {
    let tenant = tenant_from_headers(&headers)?;
    let upload_id = UploadId::parse(&upload_id)?;
    Ok(Json(
        state.deployments.get_upload_intent(tenant, upload_id).await?,
    ))
}

/// POST /artifacts/directupload/{id}/complete - finish a direct upload.
///
/// Responds 202; the artifact is created asynchronously once ingestion
/// completes.
#[tracing::instrument(skip(state, headers, body))]
pub async fn complete_direct_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(upload_id): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let tenant = tenant_from_headers(&headers)?;
    let upload_id = UploadId::parse(&upload_id)?;
    let metadata = if body.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&body).map_err(|e| {
            crate::error::ApiError::InvalidInput(format!("unreadable completion metadata: {e}"))
        })?)
    };
    state
        .deployments
        .complete_direct_upload(tenant, upload_id, metadata)
        .await?;

    let deployments = state.deployments.clone();
    tokio::spawn(async move {
        deployments.ingest_direct_upload(tenant, upload_id).await;
    });
    Ok(StatusCode::ACCEPTED)
}
