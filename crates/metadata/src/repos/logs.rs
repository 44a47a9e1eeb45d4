//! Device deployment log repository.

use crate::error::MetadataResult;
use crate::models::LogMessageRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for append-only device deployment logs.
#[async_trait]
pub trait LogRepo: Send + Sync {
    /// Append a batch of log messages. Batches are immutable once written.
    async fn append_log_messages(&self, messages: &[LogMessageRow]) -> MetadataResult<()>;

    /// Read all log messages for (deployment, device) in append order.
    async fn get_log_messages(
        &self,
        tenant_id: Uuid,
        deployment_id: Uuid,
        device_id: &str,
    ) -> MetadataResult<Vec<LogMessageRow>>;
}
