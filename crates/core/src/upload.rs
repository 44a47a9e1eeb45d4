//! Direct-upload intents.

use crate::ids::UploadId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Status of a direct-upload intent.
///
/// The intent stays at a non-final marker if ingestion never completes;
/// callers detect failure by polling for the resulting artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Upload link issued, object not yet observed.
    Pending,
    /// Object-storage write observed, ingestion running.
    Processing,
    /// Ingestion finished and the artifact exists.
    Done,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
        }
    }

    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            _ => Err(crate::Error::UnknownStatus(s.to_string())),
        }
    }
}

/// A two-phase direct upload: the client writes straight to object
/// storage with a pre-signed URL, then notifies the service to ingest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadIntent {
    pub id: UploadId,
    pub status: UploadStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated: OffsetDateTime,
    /// Caller-supplied metadata recorded at completion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl UploadIntent {
    pub fn new() -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: UploadId::new(),
            status: UploadStatus::Pending,
            created: now,
            updated: now,
            metadata: None,
        }
    }
}

impl Default for UploadIntent {
    fn default() -> Self {
        Self::new()
    }
}
