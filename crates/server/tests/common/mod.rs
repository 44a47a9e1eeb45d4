//! Common test utilities and fixtures.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use hangar_core::config::AppConfig;
use hangar_metadata::{MetadataStore, SqliteStore};
use hangar_server::directory::EmptyDirectory;
use hangar_server::introspect::EnvelopeIntrospector;
use hangar_server::{AppState, create_router};
use hangar_storage::{FilesystemBackend, ObjectStore};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: Router,
    pub state: AppState,
    pub tenant: Uuid,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage and a fresh tenant.
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp directory");
        let config = AppConfig::for_testing(temp_dir.path());

        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(temp_dir.path().join("storage"))
                .await
                .expect("failed to create storage backend"),
        );
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp_dir.path().join("metadata.db"))
                .await
                .expect("failed to create metadata store"),
        );

        let state = AppState::new(
            config,
            metadata,
            storage,
            Arc::new(EnvelopeIntrospector),
            Arc::new(EmptyDirectory),
        );
        let router = create_router(state.clone());

        Self {
            router,
            state,
            tenant: Uuid::new_v4(),
            _temp_dir: temp_dir,
        }
    }

    /// Issue a management/internal request scoped to the test tenant.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.raw_request(method, uri, body, Some(self.tenant), None)
            .await
    }

    /// Issue a device-facing request carrying tenant and device identity.
    pub async fn device_request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        device_id: &str,
    ) -> (StatusCode, Value) {
        self.raw_request(method, uri, body, Some(self.tenant), Some(device_id))
            .await
    }

    /// Issue a request with explicit identity headers.
    pub async fn raw_request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        tenant: Option<Uuid>,
        device_id: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tenant) = tenant {
            builder = builder.header("X-Tenant-Id", tenant.to_string());
        }
        if let Some(device_id) = device_id {
            builder = builder.header("X-Device-Id", device_id);
        }

        let body = match body {
            Some(v) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };

        let request = builder.body(body).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Upload an artifact envelope and return its id.
    pub async fn create_artifact(&self, name: &str, device_types: &[&str]) -> String {
        let payload = artifact_envelope(name, device_types);
        let (status, body) = self
            .request(
                "POST",
                "/api/management/v1/deployments/artifacts",
                Some(payload),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "artifact upload failed: {body}");
        body["id"].as_str().unwrap().to_string()
    }

    /// Create a deployment targeting the given devices and return its id.
    pub async fn create_deployment(&self, artifact_name: &str, devices: &[&str]) -> String {
        let (status, body) = self
            .request(
                "POST",
                "/api/management/v1/deployments/deployments",
                Some(json!({
                    "name": format!("deploy {artifact_name}"),
                    "artifact_name": artifact_name,
                    "devices": devices,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "deployment create failed: {body}");
        body["id"].as_str().unwrap().to_string()
    }

    /// Poll for the next deployment as a device.
    pub async fn poll_next(
        &self,
        device_id: &str,
        device_type: &str,
        installed: &str,
    ) -> (StatusCode, Value) {
        let uri = format!(
            "/api/devices/v1/deployments/device/deployments/next?artifact_name={installed}&device_type={device_type}"
        );
        self.device_request("GET", &uri, None, device_id).await
    }

    /// Report a device status for a deployment.
    pub async fn report_status(
        &self,
        device_id: &str,
        deployment_id: &str,
        status: &str,
    ) -> StatusCode {
        let uri =
            format!("/api/devices/v1/deployments/device/deployments/{deployment_id}/status");
        let (code, _) = self
            .device_request("PUT", &uri, Some(json!({"status": status})), device_id)
            .await;
        code
    }

    /// Read the statistics of a deployment.
    pub async fn stats(&self, deployment_id: &str) -> Value {
        let uri =
            format!("/api/management/v1/deployments/deployments/{deployment_id}/statistics");
        let (status, body) = self.request("GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK, "statistics read failed: {body}");
        body
    }
}

/// A minimal artifact envelope payload for the test introspector.
#[allow(dead_code)]
pub fn artifact_envelope(name: &str, device_types: &[&str]) -> Value {
    json!({
        "name": name,
        "device_types_compatible": device_types,
        "updates": [{"type_info": {"type": "rootfs-image"}}],
    })
}
