//! Artifact introspection.
//!
//! Parsing the artifact container format is delegated to an external
//! tool behind this trait; the orchestration core only consumes the
//! extracted metadata.

use async_trait::async_trait;
use hangar_core::ArtifactMeta;
use sha2::{Digest, Sha256};

/// Extracts artifact metadata from an uploaded payload.
#[async_trait]
pub trait ArtifactIntrospector: Send + Sync {
    /// Inspect the payload and return its metadata, or a reason why the
    /// payload is not a valid artifact.
    async fn inspect(&self, payload: &[u8]) -> Result<ArtifactMeta, String>;
}

/// Introspector for the JSON artifact envelope: the payload starts with a
/// metadata document (name, compatibility, updates) produced by the
/// packaging tool.
pub struct EnvelopeIntrospector;

#[async_trait]
impl ArtifactIntrospector for EnvelopeIntrospector {
    async fn inspect(&self, payload: &[u8]) -> Result<ArtifactMeta, String> {
        let meta: ArtifactMeta = serde_json::from_slice(payload)
            .map_err(|e| format!("unreadable artifact metadata: {e}"))?;
        if meta.name.is_empty() {
            return Err("artifact name is required".to_string());
        }
        if meta.device_types_compatible.is_empty() {
            return Err("artifact lists no compatible device types".to_string());
        }
        Ok(meta)
    }
}

/// SHA-256 checksum of a payload, hex encoded.
pub fn payload_checksum(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inspect_valid_envelope() {
        let payload = serde_json::json!({
            "name": "app-v2",
            "device_types_compatible": ["rpi4"],
            "updates": [{"type_info": {"type": "rootfs-image"}}],
        });
        let meta = EnvelopeIntrospector
            .inspect(payload.to_string().as_bytes())
            .await
            .unwrap();
        assert_eq!(meta.name, "app-v2");
        assert_eq!(meta.device_types_compatible, vec!["rpi4"]);
    }

    #[tokio::test]
    async fn test_inspect_rejects_garbage() {
        assert!(EnvelopeIntrospector.inspect(b"not an artifact").await.is_err());
        assert!(
            EnvelopeIntrospector
                .inspect(br#"{"name":"","device_types_compatible":["x"]}"#)
                .await
                .is_err()
        );
    }

    #[test]
    fn test_checksum_is_hex_sha256() {
        let checksum = payload_checksum(b"payload");
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
