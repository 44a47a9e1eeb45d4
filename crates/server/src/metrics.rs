//! Prometheus metrics for the hangar server.
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus
//! scraping; restrict it to scraper IPs at the infrastructure level.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static DEPLOYMENTS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "hangar_deployments_created_total",
        "Total number of deployments created",
    )
    .expect("metric creation failed")
});

pub static DEPLOYMENTS_ABORTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "hangar_deployments_aborted_total",
        "Total number of deployments aborted",
    )
    .expect("metric creation failed")
});

pub static ASSIGNMENTS_ISSUED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "hangar_assignments_issued_total",
        "Total number of signed assignments handed to devices",
    )
    .expect("metric creation failed")
});

pub static STATUS_REPORTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "hangar_status_reports_total",
            "Device status reports by reported status",
        ),
        &["status"],
    )
    .expect("metric creation failed")
});

pub static DOWNLOADS_REJECTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "hangar_downloads_rejected_total",
        "Download requests failing signed link verification",
    )
    .expect("metric creation failed")
});

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry. Idempotent.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(DEPLOYMENTS_CREATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(DEPLOYMENTS_ABORTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ASSIGNMENTS_ISSUED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STATUS_REPORTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(DOWNLOADS_REJECTED.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus text exposition.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new()).into_response();
    }
    (
        [(axum::http::header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}
