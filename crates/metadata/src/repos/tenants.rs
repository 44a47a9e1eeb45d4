//! Tenant repository.

use crate::error::MetadataResult;
use crate::models::TenantRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for tenant provisioning.
#[async_trait]
pub trait TenantRepo: Send + Sync {
    /// Create a tenant. Creating an existing tenant is a no-op so that
    /// provisioning can be retried safely.
    async fn ensure_tenant(&self, tenant: &TenantRow) -> MetadataResult<()>;

    /// Get a tenant by ID.
    async fn get_tenant(&self, tenant_id: Uuid) -> MetadataResult<Option<TenantRow>>;
}
