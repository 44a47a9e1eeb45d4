//! Route configuration.

use crate::deployments::DOWNLOAD_PATH;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::{delete, get, post, put};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let management_routes = Router::new()
        .route(
            "/api/management/v1/deployments/deployments",
            post(handlers::create_deployment).get(handlers::list_deployments),
        )
        .route(
            "/api/management/v1/deployments/deployments/{deployment_id}",
            get(handlers::show_deployment),
        )
        .route(
            "/api/management/v1/deployments/deployments/{deployment_id}/statistics",
            get(handlers::deployment_statistics),
        )
        .route(
            "/api/management/v1/deployments/deployments/{deployment_id}/devices",
            get(handlers::list_deployment_devices),
        )
        .route(
            "/api/management/v1/deployments/deployments/{deployment_id}/status",
            put(handlers::abort_deployment),
        )
        .route(
            "/api/management/v1/deployments/deployments/{deployment_id}/devices/{device_id}/log",
            get(handlers::get_device_log),
        )
        .route(
            "/api/management/v1/deployments/deployments/configuration/{device_id}/{deployment_id}",
            post(handlers::create_configuration_deployment),
        )
        // Artifact catalog
        .route(
            "/api/management/v1/deployments/artifacts",
            get(handlers::list_artifacts).post(handlers::upload_artifact),
        )
        .route(
            "/api/management/v1/deployments/artifacts/generate",
            post(handlers::generate_artifact),
        )
        .route(
            "/api/management/v1/deployments/artifacts/directupload",
            post(handlers::request_direct_upload),
        )
        .route(
            "/api/management/v1/deployments/artifacts/directupload/{upload_id}",
            get(handlers::show_direct_upload),
        )
        .route(
            "/api/management/v1/deployments/artifacts/directupload/{upload_id}/complete",
            post(handlers::complete_direct_upload),
        )
        .route(
            "/api/management/v1/deployments/artifacts/{artifact_id}",
            get(handlers::show_artifact).delete(handlers::delete_artifact),
        )
        // Releases
        .route(
            "/api/management/v1/deployments/deployments/releases",
            get(handlers::list_releases),
        )
        .route(
            "/api/management/v1/deployments/deployments/releases/{release_name}/notes",
            axum::routing::patch(handlers::patch_release_notes),
        );

    let device_routes = Router::new()
        .route(
            "/api/devices/v1/deployments/device/deployments/next",
            get(handlers::next_deployment),
        )
        .route(
            "/api/devices/v1/deployments/device/deployments/{deployment_id}/status",
            put(handlers::report_status),
        )
        .route(
            "/api/devices/v1/deployments/device/deployments/{deployment_id}/log",
            put(handlers::upload_log),
        )
        .route(DOWNLOAD_PATH, get(handlers::download));

    let internal_routes = Router::new()
        .route("/api/internal/v1/deployments/tenants", post(handlers::create_tenant))
        .route(
            "/api/internal/v1/deployments/tenants/{tenant_id}/storage/settings",
            get(handlers::get_storage_settings).put(handlers::put_storage_settings),
        )
        .route(
            "/api/internal/v1/deployments/tenants/{tenant_id}/devices/{device_id}",
            delete(handlers::decommission_device),
        )
        // Health check (intentionally unauthenticated for probes)
        .route("/health", get(handlers::health_check));

    let mut router = Router::new()
        .merge(management_routes)
        .merge(device_routes)
        .merge(internal_routes);

    // When enabled, the /metrics endpoint must be network-restricted to
    // authorized Prometheus scraper IPs.
    if state.config.server.metrics_enabled {
        router = router.merge(Router::new().route("/metrics", get(metrics_handler)));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
