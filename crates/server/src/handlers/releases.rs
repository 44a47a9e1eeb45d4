//! Release listing and notes handlers.

use crate::error::ApiResult;
use crate::handlers::common::tenant_from_headers;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use hangar_core::{Release, ReleaseNotes};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ReleaseListQuery {
    pub name: Option<String>,
}

/// GET /deployments/releases - list releases grouped by artifact name.
pub async fn list_releases(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReleaseListQuery>,
) -> ApiResult<Json<Vec<Release>>> {
    let tenant = tenant_from_headers(&headers)?;
    Ok(Json(
        state
            .deployments
            .list_releases(tenant, query.name.as_deref())
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct NotesPatch {
    pub notes: String,
}

/// PATCH /deployments/releases/{name}/notes - replace release notes.
#[tracing::instrument(skip(state, headers, patch))]
pub async fn patch_release_notes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(release_name): Path<String>,
    Json(patch): Json<NotesPatch>,
) -> ApiResult<StatusCode> {
    let tenant = tenant_from_headers(&headers)?;
    state
        .deployments
        .put_release_notes(tenant, &release_name, ReleaseNotes(patch.notes))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
