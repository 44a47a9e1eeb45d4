//! Per-tenant storage settings repository.

use crate::error::MetadataResult;
use crate::models::StorageSettingsRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for per-tenant object storage settings.
#[async_trait]
pub trait SettingsRepo: Send + Sync {
    /// Get the storage settings for a tenant.
    async fn get_storage_settings(
        &self,
        tenant_id: Uuid,
    ) -> MetadataResult<Option<StorageSettingsRow>>;

    /// Replace the storage settings for a tenant.
    async fn put_storage_settings(&self, settings: &StorageSettingsRow) -> MetadataResult<()>;
}
