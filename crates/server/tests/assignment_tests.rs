//! Device assignment: idempotent re-issue, short-circuits and device-type
//! consistency.

mod common;

use axum::http::StatusCode;
use common::TestServer;

/// Claim parameters of a signed link, signature and expiry excluded.
fn link_claims(instructions: &serde_json::Value) -> Vec<(String, String)> {
    let uri = instructions["artifact"]["source"]["uri"].as_str().unwrap();
    let query = uri.split_once('?').unwrap().1;
    let mut claims: Vec<(String, String)> = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(k, _)| *k != "x-dep-expire" && *k != "x-dep-signature")
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    claims.sort();
    claims
}

#[tokio::test]
async fn pending_polls_are_idempotent_and_claim_identical() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4"]).await;
    let deployment = server.create_deployment("app-v2", &["dev-1"]).await;

    let (status, first) = server.poll_next("dev-1", "rpi4", "app-v1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["id"], deployment);

    let (status, second) = server.poll_next("dev-1", "rpi4", "app-v1").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        first["artifact"]["artifact_name"],
        second["artifact"]["artifact_name"]
    );
    assert_eq!(link_claims(&first), link_claims(&second));

    // Both polls left the device pending.
    let stats = server.stats(&deployment).await;
    assert_eq!(stats["pending"], 1);
}

#[tokio::test]
async fn already_installed_short_circuits() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4"]).await;
    let deployment = server.create_deployment("app-v2", &["dev-1"]).await;

    let (status, _) = server.poll_next("dev-1", "rpi4", "app-v2").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let stats = server.stats(&deployment).await;
    assert_eq!(stats["already-installed"], 1);
    assert_eq!(stats["pending"], 0);
}

#[tokio::test]
async fn incompatible_device_type_counts_noartifact() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["qemux86-64"]).await;
    let deployment = server.create_deployment("app-v2", &["dev-1"]).await;

    let (status, _) = server.poll_next("dev-1", "rpi4", "app-v1").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let stats = server.stats(&deployment).await;
    assert_eq!(stats["noartifact"], 1);
}

#[tokio::test]
async fn in_flight_devices_get_the_same_assignment_reissued() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4"]).await;
    let deployment = server.create_deployment("app-v2", &["dev-1"]).await;

    let (_, first) = server.poll_next("dev-1", "rpi4", "app-v1").await;
    server.report_status("dev-1", &deployment, "downloading").await;

    let (status, reissued) = server.poll_next("dev-1", "rpi4", "app-v1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reissued["id"], deployment);
    assert_eq!(link_claims(&first), link_claims(&reissued));
}

#[tokio::test]
async fn device_type_change_mid_deployment_conflicts() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4", "bbb"]).await;
    let deployment = server.create_deployment("app-v2", &["dev-1"]).await;

    server.poll_next("dev-1", "rpi4", "app-v1").await;
    server.report_status("dev-1", &deployment, "downloading").await;

    let (status, _) = server.poll_next("dev-1", "bbb", "app-v1").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn finished_deployments_never_resurface() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4"]).await;
    let deployment = server.create_deployment("app-v2", &["dev-1"]).await;

    server.report_status("dev-1", &deployment, "downloading").await;
    server.report_status("dev-1", &deployment, "success").await;

    let (status, _) = server.poll_next("dev-1", "rpi4", "app-v1").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let stats = server.stats(&deployment).await;
    assert_eq!(stats["success"], 1);
}

#[tokio::test]
async fn earliest_created_deployment_is_assigned_first() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4"]).await;
    server.create_artifact("app-v3", &["rpi4"]).await;
    let first = server.create_deployment("app-v2", &["dev-1"]).await;
    let second = server.create_deployment("app-v3", &["dev-1"]).await;

    let (_, instructions) = server.poll_next("dev-1", "rpi4", "app-v1").await;
    assert_eq!(instructions["id"], first);

    server.report_status("dev-1", &first, "downloading").await;
    server.report_status("dev-1", &first, "success").await;

    let (_, instructions) = server.poll_next("dev-1", "rpi4", "app-v1").await;
    assert_eq!(instructions["id"], second);
}

#[tokio::test]
async fn polls_never_cross_tenants() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4"]).await;
    server.create_deployment("app-v2", &["dev-1"]).await;

    let (status, _) = server
        .raw_request(
            "GET",
            "/api/devices/v1/deployments/device/deployments/next?artifact_name=app-v1&device_type=rpi4",
            None,
            Some(uuid::Uuid::new_v4()),
            Some("dev-1"),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn poll_requires_a_device_type() {
    let server = TestServer::new().await;
    let (status, _) = server
        .device_request(
            "GET",
            "/api/devices/v1/deployments/device/deployments/next?artifact_name=app-v1",
            None,
            "dev-1",
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
