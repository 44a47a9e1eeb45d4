//! Artifact catalog: uploads, deletion guards, releases and the
//! direct-upload flow.

mod common;

use axum::http::StatusCode;
use common::{TestServer, artifact_envelope};
use serde_json::json;
use std::time::Duration;

const ARTIFACTS: &str = "/api/management/v1/deployments/artifacts";
const RELEASES: &str = "/api/management/v1/deployments/deployments/releases";

#[tokio::test]
async fn upload_show_and_list() {
    let server = TestServer::new().await;
    let id = server.create_artifact("app-v2", &["rpi4", "bbb"]).await;

    let (status, artifact) = server
        .request("GET", &format!("{ARTIFACTS}/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(artifact["name"], "app-v2");
    assert_eq!(artifact["device_types_compatible"][0], "rpi4");
    assert_eq!(artifact["checksum"].as_str().unwrap().len(), 64);

    server.create_artifact("other", &["rpi4"]).await;
    let (_, filtered) = server
        .request("GET", &format!("{ARTIFACTS}?name=app-v2"), None)
        .await;
    assert_eq!(filtered.as_array().unwrap().len(), 1);

    let (status, _) = server
        .request(
            "GET",
            &format!("{ARTIFACTS}/{}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unreadable_payload_is_an_invalid_artifact() {
    let server = TestServer::new().await;
    let (status, _) = server
        .request("POST", ARTIFACTS, Some(json!("not an artifact envelope")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deletion_is_rejected_while_a_deployment_references_the_name() {
    let server = TestServer::new().await;
    let id = server.create_artifact("app-v2", &["rpi4"]).await;
    let deployment = server.create_deployment("app-v2", &["dev-1"]).await;

    let (status, _) = server
        .request("DELETE", &format!("{ARTIFACTS}/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Finishing the deployment releases the guard.
    let abort_uri = format!("/api/management/v1/deployments/deployments/{deployment}/status");
    server
        .request("PUT", &abort_uri, Some(json!({"status": "aborted"})))
        .await;

    let (status, _) = server
        .request("DELETE", &format!("{ARTIFACTS}/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = server
        .request("GET", &format!("{ARTIFACTS}/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn releases_group_artifacts_by_name_with_notes() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4"]).await;
    server.create_artifact("app-v2", &["bbb"]).await;
    server.create_artifact("base-image", &["rpi4"]).await;

    let (status, releases) = server.request("GET", RELEASES, None).await;
    assert_eq!(status, StatusCode::OK);
    let releases = releases.as_array().unwrap();
    assert_eq!(releases.len(), 2);
    // Sorted by name.
    assert_eq!(releases[0]["name"], "app-v2");
    assert_eq!(releases[0]["artifacts"].as_array().unwrap().len(), 2);
    assert_eq!(releases[1]["name"], "base-image");

    let (status, _) = server
        .request(
            "PATCH",
            &format!("{RELEASES}/app-v2/notes"),
            Some(json!({"notes": "second hardware revision"})),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, filtered) = server
        .request("GET", &format!("{RELEASES}?name=app-v2"), None)
        .await;
    let filtered = filtered.as_array().unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0]["notes"], "second hardware revision");

    // Notes for a name never uploaded.
    let (status, _) = server
        .request(
            "PATCH",
            &format!("{RELEASES}/ghost/notes"),
            Some(json!({"notes": "nothing here"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Oversized notes.
    let (status, _) = server
        .request(
            "PATCH",
            &format!("{RELEASES}/app-v2/notes"),
            Some(json!({"notes": "x".repeat(2000)})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn direct_upload_creates_the_artifact_asynchronously() {
    let server = TestServer::new().await;

    let (status, issued) = server
        .request("POST", &format!("{ARTIFACTS}/directupload"), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{issued}");
    let upload_id = issued["id"].as_str().unwrap().to_string();
    let put_uri = issued["link"]["uri"].as_str().unwrap();
    assert!(put_uri.starts_with("file://"));

    // The client writes straight to object storage with the pre-signed
    // capability.
    let payload = artifact_envelope("uploaded-app", &["rpi4"]).to_string();
    let path = put_uri.strip_prefix("file://").unwrap();
    std::fs::create_dir_all(std::path::Path::new(path).parent().unwrap()).unwrap();
    std::fs::write(path, payload.as_bytes()).unwrap();

    let mut completion = artifact_envelope("uploaded-app", &["rpi4"]);
    completion["size"] = json!(payload.len());
    let (status, _) = server
        .request(
            "POST",
            &format!("{ARTIFACTS}/directupload/{upload_id}/complete"),
            Some(completion.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // Completing twice conflicts.
    let (status, _) = server
        .request(
            "POST",
            &format!("{ARTIFACTS}/directupload/{upload_id}/complete"),
            Some(completion),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Ingestion is asynchronous; poll the catalog until the artifact
    // shows up.
    let mut found = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let (_, artifacts) = server
            .request("GET", &format!("{ARTIFACTS}?name=uploaded-app"), None)
            .await;
        if artifacts.as_array().is_some_and(|a| !a.is_empty()) {
            found = true;
            break;
        }
    }
    assert!(found, "ingested artifact never appeared in the catalog");

    let (status, intent) = server
        .request("GET", &format!("{ARTIFACTS}/directupload/{upload_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(intent["status"], "done");
}

#[tokio::test]
async fn completing_an_unknown_upload_is_not_found() {
    let server = TestServer::new().await;
    let (status, _) = server
        .request(
            "POST",
            &format!("{ARTIFACTS}/directupload/{}/complete", uuid::Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
