//! Deployment campaigns and their aggregate lifecycle.

use crate::device_deployment::{DeviceStatus, Stats};
use crate::ids::{DeploymentId, DeviceId};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Maximum length for deployment and artifact names.
pub const NAME_MAX_LEN: usize = 4096;

/// Overall deployment status, derived from statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    #[serde(rename = "inprogress")]
    InProgress,
    Finished,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "inprogress",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a deployment pushes to its devices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeploymentKind {
    /// A software (rootfs) update resolved by artifact name.
    Software,
    /// A configuration push with an opaque payload; the matching artifact
    /// is generated when the device asks for the update.
    Configuration {
        #[serde(with = "config_payload")]
        configuration: Vec<u8>,
    },
}

/// Serialize the configuration payload as a JSON string, accepting either
/// a string or a raw JSON value on input.
mod config_payload {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&String::from_utf8_lossy(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let value = serde_json::Value::deserialize(de)?;
        match value {
            serde_json::Value::String(s) => Ok(s.into_bytes()),
            other => Ok(other.to_string().into_bytes()),
        }
    }
}

/// Input for creating a software deployment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeploymentConstructor {
    /// Deployment name.
    pub name: String,
    /// Artifact name to be installed.
    pub artifact_name: String,
    /// Device ids targeted by the deployment.
    pub devices: Vec<DeviceId>,
}

impl DeploymentConstructor {
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() || self.name.len() > NAME_MAX_LEN {
            return Err(crate::Error::InvalidDeployment(
                "name must be between 1 and 4096 characters".to_string(),
            ));
        }
        if self.artifact_name.is_empty() || self.artifact_name.len() > NAME_MAX_LEN {
            return Err(crate::Error::InvalidDeployment(
                "artifact_name must be between 1 and 4096 characters".to_string(),
            ));
        }
        if self.devices.is_empty() {
            return Err(crate::Error::InvalidDeployment(
                "at least one device is required".to_string(),
            ));
        }
        if self.devices.iter().any(|d| d.as_str().is_empty()) {
            return Err(crate::Error::InvalidDeployment(
                "device ids must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Input for creating a configuration deployment. The deployment and
/// device identity come from the request path, not the body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigurationDeploymentConstructor {
    pub name: String,
    #[serde(with = "config_payload")]
    pub configuration: Vec<u8>,
}

impl ConfigurationDeploymentConstructor {
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() || self.name.len() > NAME_MAX_LEN {
            return Err(crate::Error::InvalidDeployment(
                "name must be between 1 and 4096 characters".to_string(),
            ));
        }
        if self.configuration.is_empty() {
            return Err(crate::Error::InvalidDeployment(
                "configuration payload is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// A deployment campaign: one artifact (or configuration payload) pushed
/// to a set of devices.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub name: String,
    pub artifact_name: String,
    pub kind: DeploymentKind,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished: Option<OffsetDateTime>,
    /// Number of devices targeted at creation time.
    pub max_devices: i64,
    /// Aggregate device status counters. Seeded with the pending bucket
    /// equal to the device count; moved bucket-to-bucket on every status
    /// transition.
    pub stats: Stats,
}

impl Deployment {
    /// Create a new software deployment from validated constructor input.
    pub fn from_constructor(constructor: &DeploymentConstructor) -> Self {
        let device_count = constructor.devices.len() as i64;
        let mut stats = Stats::new();
        stats.set(DeviceStatus::Pending, device_count);
        Self {
            id: DeploymentId::new(),
            name: constructor.name.clone(),
            artifact_name: constructor.artifact_name.clone(),
            kind: DeploymentKind::Software,
            created: OffsetDateTime::now_utc(),
            finished: None,
            max_devices: device_count,
            stats,
        }
    }

    /// Create a configuration deployment with a caller-supplied identity.
    pub fn from_configuration_constructor(
        id: DeploymentId,
        constructor: &ConfigurationDeploymentConstructor,
    ) -> Self {
        let mut stats = Stats::new();
        stats.set(DeviceStatus::Pending, 1);
        Self {
            id,
            name: constructor.name.clone(),
            // The artifact for a configuration push is generated on demand
            // and named after the deployment.
            artifact_name: constructor.name.clone(),
            kind: DeploymentKind::Configuration {
                configuration: constructor.configuration.clone(),
            },
            created: OffsetDateTime::now_utc(),
            finished: None,
            max_devices: 1,
            stats,
        }
    }

    /// A deployment is finished once every owned device deployment is
    /// terminal, or it was explicitly aborted.
    pub fn is_finished(&self) -> bool {
        self.finished.is_some() || self.max_devices <= 0 || self.stats.finished() >= self.max_devices
    }

    /// A deployment is in progress once any device moved out of pending.
    pub fn is_not_pending(&self) -> bool {
        self.stats.started() > 0
    }

    /// Derive the aggregate status from statistics.
    pub fn status(&self) -> DeploymentStatus {
        if self.is_finished() {
            DeploymentStatus::Finished
        } else if self.is_not_pending() {
            DeploymentStatus::InProgress
        } else {
            DeploymentStatus::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_deployment::DeviceStatus;

    fn constructor(devices: &[&str]) -> DeploymentConstructor {
        DeploymentConstructor {
            name: "nightly rollout".to_string(),
            artifact_name: "app-v2".to_string(),
            devices: devices
                .iter()
                .map(|d| DeviceId::parse(d).unwrap())
                .collect(),
        }
    }

    #[test]
    fn test_constructor_validation() {
        assert!(constructor(&["dev-1"]).validate().is_ok());

        let mut missing_name = constructor(&["dev-1"]);
        missing_name.name = String::new();
        assert!(missing_name.validate().is_err());

        let mut missing_artifact = constructor(&["dev-1"]);
        missing_artifact.artifact_name = String::new();
        assert!(missing_artifact.validate().is_err());

        assert!(constructor(&[]).validate().is_err());
    }

    #[test]
    fn test_status_derivation() {
        let mut deployment = Deployment::from_constructor(&constructor(&["a", "b"]));
        assert_eq!(deployment.status(), DeploymentStatus::Pending);

        deployment.stats.dec(DeviceStatus::Pending);
        deployment.stats.inc(DeviceStatus::Downloading);
        assert_eq!(deployment.status(), DeploymentStatus::InProgress);

        deployment.stats.dec(DeviceStatus::Downloading);
        deployment.stats.inc(DeviceStatus::Success);
        assert_eq!(deployment.status(), DeploymentStatus::InProgress);

        deployment.stats.dec(DeviceStatus::Pending);
        deployment.stats.inc(DeviceStatus::Failure);
        assert_eq!(deployment.status(), DeploymentStatus::Finished);
    }

    #[test]
    fn test_configuration_constructor() {
        let ok = ConfigurationDeploymentConstructor {
            name: "set-timezone".to_string(),
            configuration: br#"{"timezone":"UTC"}"#.to_vec(),
        };
        assert!(ok.validate().is_ok());

        let missing_payload = ConfigurationDeploymentConstructor {
            name: "set-timezone".to_string(),
            configuration: Vec::new(),
        };
        assert!(missing_payload.validate().is_err());

        let deployment =
            Deployment::from_configuration_constructor(DeploymentId::new(), &ok);
        assert_eq!(deployment.max_devices, 1);
        assert!(matches!(deployment.kind, DeploymentKind::Configuration { .. }));
    }

    #[test]
    fn test_config_payload_accepts_object_and_string() {
        let from_object: ConfigurationDeploymentConstructor =
            serde_json::from_str(r#"{"name":"cfg","configuration":{"key":"value"}}"#).unwrap();
        assert_eq!(from_object.configuration, br#"{"key":"value"}"#.to_vec());

        let from_string: ConfigurationDeploymentConstructor =
            serde_json::from_str(r#"{"name":"cfg","configuration":"raw text"}"#).unwrap();
        assert_eq!(from_string.configuration, b"raw text".to_vec());
    }
}
