//! Release notes repository.
//!
//! Releases themselves are a view over artifacts; only the notes attached
//! to a release name are stored.

use crate::error::MetadataResult;
use crate::models::ReleaseNoteRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for release notes.
#[async_trait]
pub trait ReleaseRepo: Send + Sync {
    /// Get the notes for a release name, if any were written.
    async fn get_release_notes(
        &self,
        tenant_id: Uuid,
        release_name: &str,
    ) -> MetadataResult<Option<ReleaseNoteRow>>;

    /// Replace the notes for a release name.
    async fn put_release_notes(&self, notes: &ReleaseNoteRow) -> MetadataResult<()>;
}
