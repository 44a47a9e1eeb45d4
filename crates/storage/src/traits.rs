//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Object storage for artifact payloads.
///
/// The orchestration core never reads payload bytes through this trait;
/// it only needs existence checks and pre-signed capabilities. `put` is
/// exercised by ingestion and tests.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object under the given key.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Delete an object. Deleting a missing object is an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Produce a pre-signed read URL for the object.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Produce a pre-signed write URL for the object.
    async fn presign_put(&self, key: &str, expires_in: Duration) -> StorageResult<String>;
}
