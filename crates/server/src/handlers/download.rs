//! Signed download link resolution.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;

/// GET /api/devices/v1/deployments/download - verify a signed link and
/// redirect to the backing object.
///
/// Verification failures follow the link policy: missing security
/// parameters are 400, expired or tampered links are 403.
#[tracing::instrument(skip(state, params))]
pub async fn download(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let claims = state.deployments.verify_download(&params).inspect_err(|_| {
        metrics::DOWNLOADS_REJECTED.inc();
    })?;

    let location = state.deployments.resolve_download(&claims).await?;
    let location_value = location
        .parse()
        .map_err(|_| ApiError::Internal("unrepresentable object location".to_string()))?;
    let mut response = StatusCode::FOUND.into_response();
    response
        .headers_mut()
        .insert(axum::http::header::LOCATION, location_value);
    Ok(response)
}
