//! Direct-upload intent repository.

use crate::error::MetadataResult;
use crate::models::UploadIntentRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for direct-upload intents.
#[async_trait]
pub trait UploadIntentRepo: Send + Sync {
    /// Create a new intent.
    async fn create_intent(&self, intent: &UploadIntentRow) -> MetadataResult<()>;

    /// Get an intent by ID.
    async fn get_intent(
        &self,
        tenant_id: Uuid,
        upload_id: Uuid,
    ) -> MetadataResult<Option<UploadIntentRow>>;

    /// Conditionally advance the intent status, recording caller metadata.
    /// Returns `false` when the current status is no longer `expected`.
    async fn transition_intent_status(
        &self,
        tenant_id: Uuid,
        upload_id: Uuid,
        expected: &str,
        to: &str,
        metadata: Option<&str>,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<bool>;
}
