//! Deployment lifecycle: creation validation, status reports, statistics
//! bookkeeping, abort and pagination.

mod common;

use axum::http::StatusCode;
use common::TestServer;
use serde_json::json;

#[tokio::test]
async fn create_rejects_missing_fields() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4"]).await;

    for body in [
        json!({"artifact_name": "app-v2", "devices": ["dev-1"]}),
        json!({"name": "d", "devices": ["dev-1"]}),
        json!({"name": "d", "artifact_name": "app-v2", "devices": []}),
        json!({"name": "", "artifact_name": "app-v2", "devices": ["dev-1"]}),
    ] {
        let (status, _) = server
            .request(
                "POST",
                "/api/management/v1/deployments/deployments",
                Some(body),
            )
            .await;
        // Missing fields fail serde extraction, empty ones fail validation.
        assert!(
            status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY,
            "expected 400/422, got {status}"
        );
    }
}

#[tokio::test]
async fn create_rejects_unknown_artifact_name() {
    let server = TestServer::new().await;
    let (status, body) = server
        .request(
            "POST",
            "/api/management/v1/deployments/deployments",
            Some(json!({
                "name": "ghost rollout",
                "artifact_name": "never-uploaded",
                "devices": ["dev-1"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
}

#[tokio::test]
async fn full_lifecycle_moves_counters_bucket_by_bucket() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4"]).await;
    let deployment = server.create_deployment("app-v2", &["dev-1"]).await;

    let show_uri = format!("/api/management/v1/deployments/deployments/{deployment}");
    let (_, view) = server.request("GET", &show_uri, None).await;
    assert_eq!(view["status"], "pending");

    // The device picks up the assignment; status stays pending until it
    // reports progress.
    let (status, instructions) = server.poll_next("dev-1", "rpi4", "app-v1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(instructions["artifact"]["artifact_name"], "app-v2");
    let stats = server.stats(&deployment).await;
    assert_eq!(stats["pending"], 1);

    for (report, bucket) in [
        ("downloading", "downloading"),
        ("installing", "installing"),
        ("rebooting", "rebooting"),
    ] {
        assert_eq!(
            server.report_status("dev-1", &deployment, report).await,
            StatusCode::NO_CONTENT
        );
        let stats = server.stats(&deployment).await;
        assert_eq!(stats[bucket], 1, "one device in '{bucket}': {stats}");
        let total: i64 = stats.as_object().unwrap().values().map(|v| v.as_i64().unwrap()).sum();
        assert_eq!(total, 1, "bucket moves conserve the device count");

        let (_, view) = server.request("GET", &show_uri, None).await;
        assert_eq!(view["status"], "inprogress");
    }

    assert_eq!(
        server.report_status("dev-1", &deployment, "success").await,
        StatusCode::NO_CONTENT
    );
    let stats = server.stats(&deployment).await;
    assert_eq!(stats["success"], 1);
    assert_eq!(stats["rebooting"], 0);

    let (_, view) = server.request("GET", &show_uri, None).await;
    assert_eq!(view["status"], "finished");
    assert!(view["finished"].is_string());
}

#[tokio::test]
async fn pause_checkpoints_count_like_any_in_flight_status() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4"]).await;
    let deployment = server.create_deployment("app-v2", &["dev-1"]).await;

    for report in [
        "downloading",
        "pause_before_installing",
        "installing",
        "pause_before_committing",
        "pause_before_rebooting",
        "rebooting",
        "success",
    ] {
        assert_eq!(
            server.report_status("dev-1", &deployment, report).await,
            StatusCode::NO_CONTENT,
            "report '{report}' must be accepted"
        );
    }
    let stats = server.stats(&deployment).await;
    assert_eq!(stats["success"], 1);
}

#[tokio::test]
async fn late_reports_are_rejected_and_leave_stats_untouched() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4"]).await;
    let deployment = server.create_deployment("app-v2", &["dev-1"]).await;

    server.report_status("dev-1", &deployment, "downloading").await;
    assert_eq!(
        server.report_status("dev-1", &deployment, "failure").await,
        StatusCode::NO_CONTENT
    );
    let before = server.stats(&deployment).await;

    // Any different status after a terminal one is a conflict.
    for late in ["rebooting", "downloading", "success"] {
        assert_eq!(
            server.report_status("dev-1", &deployment, late).await,
            StatusCode::CONFLICT,
            "late '{late}' must be rejected"
        );
        assert_eq!(server.stats(&deployment).await, before);
    }

    // A duplicate of the recorded terminal status is a no-op retry.
    assert_eq!(
        server.report_status("dev-1", &deployment, "failure").await,
        StatusCode::NO_CONTENT
    );
    assert_eq!(server.stats(&deployment).await, before);
}

#[tokio::test]
async fn backward_in_flight_reports_are_rejected() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4"]).await;
    let deployment = server.create_deployment("app-v2", &["dev-1"]).await;

    server.report_status("dev-1", &deployment, "rebooting").await;
    assert_eq!(
        server.report_status("dev-1", &deployment, "downloading").await,
        StatusCode::CONFLICT
    );
}

#[tokio::test]
async fn abort_forces_pending_devices_and_rejects_a_second_abort() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4"]).await;
    let deployment = server
        .create_deployment("app-v2", &["dev-1", "dev-2", "dev-3"])
        .await;

    let status_uri = format!("/api/management/v1/deployments/deployments/{deployment}/status");
    let (status, _) = server
        .request("PUT", &status_uri, Some(json!({"status": "aborted"})))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let stats = server.stats(&deployment).await;
    assert_eq!(stats["aborted"], 3);
    assert_eq!(stats["pending"], 0);

    let show_uri = format!("/api/management/v1/deployments/deployments/{deployment}");
    let (_, view) = server.request("GET", &show_uri, None).await;
    assert_eq!(view["status"], "finished");

    let (status, _) = server
        .request("PUT", &status_uri, Some(json!({"status": "aborted"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Reports against aborted device deployments are late reports.
    assert_eq!(
        server.report_status("dev-1", &deployment, "downloading").await,
        StatusCode::CONFLICT
    );
}

#[tokio::test]
async fn device_listing_paginates_without_overlap() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4"]).await;
    let devices: Vec<String> = (0..30).map(|i| format!("dev-{i:02}")).collect();
    let refs: Vec<&str> = devices.iter().map(String::as_str).collect();
    let deployment = server.create_deployment("app-v2", &refs).await;

    let base = format!("/api/management/v1/deployments/deployments/{deployment}/devices");

    let (status, page) = server.request("GET", &base, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page.as_array().unwrap().len(), 20, "default page size is 20");

    let (_, all) = server
        .request("GET", &format!("{base}?per_page=30"), None)
        .await;
    assert_eq!(all.as_array().unwrap().len(), 30);

    let (_, page1) = server
        .request("GET", &format!("{base}?page=1&per_page=20"), None)
        .await;
    let (_, page2) = server
        .request("GET", &format!("{base}?page=2&per_page=20"), None)
        .await;
    assert_eq!(page1.as_array().unwrap().len(), 20);
    assert_eq!(page2.as_array().unwrap().len(), 10);

    let mut ids: Vec<String> = page1
        .as_array()
        .unwrap()
        .iter()
        .chain(page2.as_array().unwrap())
        .map(|d| d["device_id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 30, "pages must not overlap or leave gaps");

    let (status, _) = server
        .request("GET", &format!("{base}?page=0"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn device_logs_append_and_read_back() {
    let server = TestServer::new().await;
    server.create_artifact("app-v2", &["rpi4"]).await;
    let deployment = server.create_deployment("app-v2", &["dev-1"]).await;

    let log_uri = format!("/api/devices/v1/deployments/device/deployments/{deployment}/log");
    let (status, _) = server
        .device_request(
            "PUT",
            &log_uri,
            Some(json!({"messages": [
                {"level": "info", "message": "update started", "timestamp": "2024-05-01T12:00:00Z"},
                {"level": "error", "message": "partition full", "timestamp": "2024-05-01T12:01:00Z"},
            ]})),
            "dev-1",
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Empty batches are rejected.
    let (status, _) = server
        .device_request("PUT", &log_uri, Some(json!({"messages": []})), "dev-1")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A device without a deployment entry cannot write logs.
    let (status, _) = server
        .device_request(
            "PUT",
            &log_uri,
            Some(json!({"messages": [
                {"level": "info", "message": "hi", "timestamp": "2024-05-01T12:00:00Z"},
            ]})),
            "stranger",
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let read_uri = format!(
        "/api/management/v1/deployments/deployments/{deployment}/devices/dev-1/log"
    );
    let (status, _) = server.request("GET", &read_uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let listing_uri = format!("/api/management/v1/deployments/deployments/{deployment}/devices");
    let (_, devices) = server.request("GET", &listing_uri, None).await;
    assert_eq!(devices[0]["log"], true);
}
