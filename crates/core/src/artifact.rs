//! Artifact records and their update metadata.

use crate::ids::ArtifactId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Maximum length for the artifact description.
pub const DESCRIPTION_MAX_LEN: usize = 4096;

/// A single payload file inside an update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFile {
    pub name: String,
    pub size: i64,
    pub checksum: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

/// The type tag of an update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateType {
    #[serde(rename = "type")]
    pub update_type: String,
}

/// One update carried by an artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub type_info: UpdateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<UpdateFile>>,
    /// Keys this update provides once installed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provides: Option<BTreeMap<String, String>>,
    /// Provide keys cleared by installing this update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clears_provides: Option<Vec<String>>,
}

/// An immutable, checksummed update payload with device-type
/// compatibility metadata. Created on upload completion, never mutated,
/// deleted only while unreferenced by any active deployment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub size: i64,
    pub checksum: String,
    pub device_types_compatible: Vec<String>,
    #[serde(default)]
    pub updates: Vec<Update>,
    #[serde(with = "time::serde::rfc3339")]
    pub modified: OffsetDateTime,
}

impl Artifact {
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() {
            return Err(crate::Error::InvalidArtifact(
                "artifact name is required".to_string(),
            ));
        }
        if self.device_types_compatible.is_empty()
            || self.device_types_compatible.iter().any(String::is_empty)
        {
            return Err(crate::Error::InvalidArtifact(
                "at least one non-empty compatible device type is required".to_string(),
            ));
        }
        if self.description.len() > DESCRIPTION_MAX_LEN {
            return Err(crate::Error::InvalidArtifact(format!(
                "description exceeds {DESCRIPTION_MAX_LEN} characters"
            )));
        }
        Ok(())
    }

    /// Check compatibility with a device type.
    pub fn supports(&self, device_type: &str) -> bool {
        self.device_types_compatible
            .iter()
            .any(|t| t == device_type)
    }

    /// The update type tags carried by this artifact.
    pub fn update_types(&self) -> Vec<&str> {
        self.updates
            .iter()
            .map(|u| u.type_info.update_type.as_str())
            .collect()
    }
}

/// Metadata extracted from an uploaded artifact payload by the
/// introspection tool.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub device_types_compatible: Vec<String>,
    #[serde(default)]
    pub updates: Vec<Update>,
}
