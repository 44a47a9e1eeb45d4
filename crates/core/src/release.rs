//! Releases: the grouping of artifacts sharing a name.

use crate::artifact::Artifact;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum length for release notes.
pub const NOTES_MAX_LEN: usize = 1024;

/// Free-text notes attached to a release name, mutable independently of
/// any single artifact.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseNotes(pub String);

impl ReleaseNotes {
    pub fn validate(&self) -> crate::Result<()> {
        if self.0.len() > NOTES_MAX_LEN {
            return Err(crate::Error::InvalidNotes(format!(
                "notes exceed {NOTES_MAX_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// A release is a view: every artifact sharing a name, a derived set of
/// update types, and the optional notes for that name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Release {
    pub name: String,
    pub artifacts: Vec<Artifact>,
    /// Update type tags drawn from the artifacts, deduplicated and sorted.
    #[serde(rename = "update_types")]
    pub update_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<ReleaseNotes>,
}

impl Release {
    fn from_artifacts(name: String, artifacts: Vec<Artifact>) -> Self {
        let mut update_types: Vec<String> = artifacts
            .iter()
            .flat_map(|a| a.update_types())
            .map(str::to_string)
            .collect();
        update_types.sort();
        update_types.dedup();
        Self {
            name,
            artifacts,
            update_types,
            notes: None,
        }
    }
}

/// Group artifacts into releases, sorted by name. Grouping is stable:
/// identical catalog content always yields the same sequence.
pub fn group_releases(artifacts: Vec<Artifact>) -> Vec<Release> {
    let mut by_name: BTreeMap<String, Vec<Artifact>> = BTreeMap::new();
    for artifact in artifacts {
        by_name.entry(artifact.name.clone()).or_default().push(artifact);
    }
    by_name
        .into_iter()
        .map(|(name, mut artifacts)| {
            artifacts.sort_by(|a, b| a.modified.cmp(&b.modified).then(a.id.cmp(&b.id)));
            Release::from_artifacts(name, artifacts)
        })
        .collect()
}
