//! Device deployment logs.

use crate::ids::{DeploymentId, DeviceId};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Maximum length of a single log message.
pub const MESSAGE_MAX_LEN: usize = 4096;

/// One log line reported by a device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: String,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl LogMessage {
    pub fn validate(&self) -> crate::Result<()> {
        if self.level.is_empty() {
            return Err(crate::Error::InvalidLog("missing level".to_string()));
        }
        if self.message.is_empty() {
            return Err(crate::Error::InvalidLog("missing message".to_string()));
        }
        if self.message.len() > MESSAGE_MAX_LEN {
            return Err(crate::Error::InvalidLog(format!(
                "message exceeds {MESSAGE_MAX_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// An append-only log batch for one device within one deployment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeploymentLog {
    pub device_id: DeviceId,
    pub deployment_id: DeploymentId,
    pub messages: Vec<LogMessage>,
}

impl DeploymentLog {
    pub fn validate(&self) -> crate::Result<()> {
        if self.messages.is_empty() {
            return Err(crate::Error::InvalidLog("empty message batch".to_string()));
        }
        for message in &self.messages {
            message.validate()?;
        }
        Ok(())
    }

    /// Render the log as plain text, one line per message.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for message in &self.messages {
            let ts = message
                .timestamp
                .format(&Rfc3339)
                .unwrap_or_else(|_| message.timestamp.to_string());
            let _ = writeln!(out, "{} {} {}", ts, message.level, message.message);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn log(messages: Vec<LogMessage>) -> DeploymentLog {
        DeploymentLog {
            device_id: DeviceId::parse("dev-1").unwrap(),
            deployment_id: DeploymentId::new(),
            messages,
        }
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(log(Vec::new()).validate().is_err());
    }

    #[test]
    fn test_render() {
        let rendered = log(vec![
            LogMessage {
                level: "info".to_string(),
                message: "update started".to_string(),
                timestamp: datetime!(2024-05-01 12:00:00 UTC),
            },
            LogMessage {
                level: "error".to_string(),
                message: "checksum mismatch".to_string(),
                timestamp: datetime!(2024-05-01 12:01:00 UTC),
            },
        ])
        .render();

        assert_eq!(
            rendered,
            "2024-05-01T12:00:00Z info update started\n\
             2024-05-01T12:01:00Z error checksum mismatch\n"
        );
    }
}
