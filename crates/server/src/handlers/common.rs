//! Shared handler helpers.

use crate::error::{ApiError, ApiResult};
use axum::http::HeaderMap;
use hangar_core::ids::{DeviceId, TenantId};

/// Tenant header set by the authentication gateway.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Device identity header set by the device authentication gateway.
pub const DEVICE_HEADER: &str = "x-device-id";

/// Resolve the tenant every request is scoped to.
pub fn tenant_from_headers(headers: &HeaderMap) -> ApiResult<TenantId> {
    let raw = headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ApiError::InvalidInput(format!("missing or unreadable {TENANT_HEADER} header"))
        })?;
    TenantId::parse(raw).map_err(Into::into)
}

/// Resolve the authenticated device identity on device-facing endpoints.
pub fn device_from_headers(headers: &HeaderMap) -> ApiResult<DeviceId> {
    let raw = headers
        .get(DEVICE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ApiError::InvalidInput(format!("missing or unreadable {DEVICE_HEADER} header"))
        })?;
    DeviceId::parse(raw).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_tenant_extraction() {
        let mut headers = HeaderMap::new();
        assert!(tenant_from_headers(&headers).is_err());

        headers.insert(
            TENANT_HEADER,
            HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()).unwrap(),
        );
        assert!(tenant_from_headers(&headers).is_ok());

        headers.insert(TENANT_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(tenant_from_headers(&headers).is_err());
    }

    #[test]
    fn test_device_extraction() {
        let mut headers = HeaderMap::new();
        assert!(device_from_headers(&headers).is_err());
        headers.insert(DEVICE_HEADER, HeaderValue::from_static("dev-1"));
        assert_eq!(device_from_headers(&headers).unwrap().as_str(), "dev-1");
    }
}
