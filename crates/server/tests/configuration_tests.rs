//! Configuration deployments: caller-supplied identities and on-demand
//! artifact generation.

mod common;

use axum::http::StatusCode;
use common::TestServer;
use serde_json::json;
use uuid::Uuid;

fn config_uri(device_id: &str, deployment_id: &str) -> String {
    format!(
        "/api/management/v1/deployments/deployments/configuration/{device_id}/{deployment_id}"
    )
}

#[tokio::test]
async fn create_and_duplicate_conflict() {
    let server = TestServer::new().await;
    let deployment_id = Uuid::new_v4().to_string();

    let body = json!({"name": "set-timezone", "configuration": {"timezone": "UTC"}});
    let (status, created) = server
        .request("POST", &config_uri("dev-1", &deployment_id), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["id"], deployment_id);

    // Same (tenant, deployment, device) triple again.
    let (status, _) = server
        .request("POST", &config_uri("dev-1", &deployment_id), Some(body))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn create_validates_input() {
    let server = TestServer::new().await;
    let deployment_id = Uuid::new_v4().to_string();

    let (status, _) = server
        .request(
            "POST",
            &config_uri("dev-1", &deployment_id),
            Some(json!({"configuration": {"k": "v"}})),
        )
        .await;
    assert!(status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = server
        .request(
            "POST",
            &config_uri("dev-1", &deployment_id),
            Some(json!({"name": "set-timezone"})),
        )
        .await;
    assert!(status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY);

    // Malformed deployment id in the path.
    let (status, _) = server
        .request(
            "POST",
            &config_uri("dev-1", "not-a-uuid"),
            Some(json!({"name": "set-timezone", "configuration": {"k": "v"}})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn device_receives_generated_configuration_artifact() {
    let server = TestServer::new().await;
    let deployment_id = Uuid::new_v4().to_string();

    let (status, _) = server
        .request(
            "POST",
            &config_uri("dev-1", &deployment_id),
            Some(json!({"name": "set-timezone", "configuration": {"timezone": "UTC"}})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, instructions) = server.poll_next("dev-1", "rpi4", "app-v1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(instructions["id"], deployment_id);
    assert_eq!(instructions["artifact"]["artifact_name"], "set-timezone");

    // The generated artifact's signed link resolves like any other.
    let uri = instructions["artifact"]["source"]["uri"].as_str().unwrap();
    let query = uri.split_once('?').unwrap().1;
    let (status, _) = server
        .raw_request(
            "GET",
            &format!("/api/devices/v1/deployments/download?{query}"),
            None,
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FOUND);

    // Other devices in the tenant are not part of the push.
    let (status, _) = server.poll_next("dev-2", "rpi4", "app-v1").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn configuration_lifecycle_reports_like_software() {
    let server = TestServer::new().await;
    let deployment_id = Uuid::new_v4().to_string();

    server
        .request(
            "POST",
            &config_uri("dev-1", &deployment_id),
            Some(json!({"name": "set-timezone", "configuration": {"timezone": "UTC"}})),
        )
        .await;

    server.poll_next("dev-1", "rpi4", "app-v1").await;
    assert_eq!(
        server.report_status("dev-1", &deployment_id, "downloading").await,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        server.report_status("dev-1", &deployment_id, "success").await,
        StatusCode::NO_CONTENT
    );

    let show_uri = format!("/api/management/v1/deployments/deployments/{deployment_id}");
    let (_, view) = server.request("GET", &show_uri, None).await;
    assert_eq!(view["status"], "finished");
    assert_eq!(view["type"], "configuration");
}
