//! The per-device status state machine and deployment statistics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Maximum length of a device-reported substate string.
pub const SUBSTATE_MAX_LEN: usize = 200;

/// Status of a single device within a deployment.
///
/// The in-flight statuses are ordered; a device may skip checkpoints but
/// never report one it already passed. The pause statuses are optional
/// checkpoints between download, install and reboot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Pending,
    Downloading,
    PauseBeforeInstalling,
    Installing,
    PauseBeforeCommitting,
    PauseBeforeRebooting,
    Rebooting,
    Success,
    Failure,
    #[serde(rename = "already-installed")]
    AlreadyInstalled,
    #[serde(rename = "noartifact")]
    NoArtifact,
    Aborted,
    Decommissioned,
}

/// Statuses that mark a device deployment as still active.
pub const ACTIVE_STATUSES: [DeviceStatus; 7] = [
    DeviceStatus::Pending,
    DeviceStatus::Downloading,
    DeviceStatus::PauseBeforeInstalling,
    DeviceStatus::Installing,
    DeviceStatus::PauseBeforeCommitting,
    DeviceStatus::PauseBeforeRebooting,
    DeviceStatus::Rebooting,
];

/// All statuses, in the order used to seed statistics buckets.
pub const ALL_STATUSES: [DeviceStatus; 13] = [
    DeviceStatus::Pending,
    DeviceStatus::Downloading,
    DeviceStatus::PauseBeforeInstalling,
    DeviceStatus::Installing,
    DeviceStatus::PauseBeforeCommitting,
    DeviceStatus::PauseBeforeRebooting,
    DeviceStatus::Rebooting,
    DeviceStatus::Success,
    DeviceStatus::Failure,
    DeviceStatus::AlreadyInstalled,
    DeviceStatus::NoArtifact,
    DeviceStatus::Aborted,
    DeviceStatus::Decommissioned,
];

impl DeviceStatus {
    /// Parse from the wire representation.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "downloading" => Ok(Self::Downloading),
            "pause_before_installing" => Ok(Self::PauseBeforeInstalling),
            "installing" => Ok(Self::Installing),
            "pause_before_committing" => Ok(Self::PauseBeforeCommitting),
            "pause_before_rebooting" => Ok(Self::PauseBeforeRebooting),
            "rebooting" => Ok(Self::Rebooting),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "already-installed" => Ok(Self::AlreadyInstalled),
            "noartifact" => Ok(Self::NoArtifact),
            "aborted" => Ok(Self::Aborted),
            "decommissioned" => Ok(Self::Decommissioned),
            _ => Err(crate::Error::UnknownStatus(s.to_string())),
        }
    }

    /// Get the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::PauseBeforeInstalling => "pause_before_installing",
            Self::Installing => "installing",
            Self::PauseBeforeCommitting => "pause_before_committing",
            Self::PauseBeforeRebooting => "pause_before_rebooting",
            Self::Rebooting => "rebooting",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::AlreadyInstalled => "already-installed",
            Self::NoArtifact => "noartifact",
            Self::Aborted => "aborted",
            Self::Decommissioned => "decommissioned",
        }
    }

    /// Check if this status is terminal. Terminal device deployments are
    /// immutable except for log appends.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success
                | Self::Failure
                | Self::AlreadyInstalled
                | Self::NoArtifact
                | Self::Aborted
                | Self::Decommissioned
        )
    }

    /// Check if this status counts as active (deployment still in flight
    /// for this device).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Check if a device is allowed to report this status. The remaining
    /// statuses are assigned by the server only.
    pub fn is_device_reportable(&self) -> bool {
        matches!(
            self,
            Self::Downloading
                | Self::PauseBeforeInstalling
                | Self::Installing
                | Self::PauseBeforeCommitting
                | Self::PauseBeforeRebooting
                | Self::Rebooting
                | Self::Success
                | Self::Failure
                | Self::AlreadyInstalled
        )
    }

    /// Position of an in-flight status along the update path. Terminal
    /// statuses have no rank.
    fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Downloading => Some(1),
            Self::PauseBeforeInstalling => Some(2),
            Self::Installing => Some(3),
            Self::PauseBeforeCommitting => Some(4),
            Self::PauseBeforeRebooting => Some(5),
            Self::Rebooting => Some(6),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a verified status transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The status changes and statistics move one device between buckets.
    Apply,
    /// Repeated report of the current status; nothing to do.
    Noop,
}

/// Check whether moving from `from` to `to` is allowed.
///
/// The table is closed: in-flight statuses only move forward along the
/// update path, terminal statuses accept nothing but a repeat of
/// themselves, and the server-assigned side entries (`already-installed`,
/// `noartifact`) are only reachable from `pending`.
pub fn verify_transition(from: DeviceStatus, to: DeviceStatus) -> crate::Result<Transition> {
    if from == to {
        return Ok(Transition::Noop);
    }

    let denied = || crate::Error::StatusTransition {
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    };

    if from.is_terminal() {
        return Err(denied());
    }

    match to {
        // Terminal outcomes reachable from any active status.
        DeviceStatus::Success
        | DeviceStatus::Failure
        | DeviceStatus::Aborted
        | DeviceStatus::Decommissioned => Ok(Transition::Apply),
        // Server-assigned side entries, only before the device started.
        DeviceStatus::AlreadyInstalled | DeviceStatus::NoArtifact => {
            if from == DeviceStatus::Pending {
                Ok(Transition::Apply)
            } else {
                Err(denied())
            }
        }
        // A device never reports pending.
        DeviceStatus::Pending => Err(denied()),
        // In-flight statuses move strictly forward.
        _ => {
            let (from_rank, to_rank) = (from.rank().ok_or_else(denied)?, to.rank().unwrap());
            if to_rank > from_rank {
                Ok(Transition::Apply)
            } else {
                Err(denied())
            }
        }
    }
}

/// A status report sent by a device.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: DeviceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substate: Option<String>,
}

impl StatusReport {
    /// Validate the report: only device-reportable statuses, bounded substate.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.status.is_device_reportable() {
            return Err(crate::Error::UnknownStatus(format!(
                "status '{}' cannot be reported by a device",
                self.status
            )));
        }
        if let Some(substate) = &self.substate
            && substate.len() > SUBSTATE_MAX_LEN
        {
            return Err(crate::Error::InvalidDeployment(format!(
                "substate exceeds {SUBSTATE_MAX_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// The currently installed software as reported by a polling device.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstalledArtifact {
    pub artifact_name: String,
    pub device_type: String,
}

impl InstalledArtifact {
    pub fn validate(&self) -> crate::Result<()> {
        if self.device_type.is_empty() {
            return Err(crate::Error::InvalidDeployment(
                "missing device type".to_string(),
            ));
        }
        Ok(())
    }
}

/// Aggregate statistics: device count per status bucket.
///
/// The sum of all buckets always equals the number of device deployments
/// owned by the deployment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stats(HashMap<String, i64>);

impl Stats {
    /// Create statistics with every bucket zeroed.
    pub fn new() -> Self {
        let mut buckets = HashMap::new();
        for status in ALL_STATUSES {
            buckets.insert(status.as_str().to_string(), 0);
        }
        Self(buckets)
    }

    pub fn get(&self, status: DeviceStatus) -> i64 {
        self.0.get(status.as_str()).copied().unwrap_or(0)
    }

    pub fn set(&mut self, status: DeviceStatus, count: i64) {
        self.0.insert(status.as_str().to_string(), count);
    }

    pub fn inc(&mut self, status: DeviceStatus) {
        *self.0.entry(status.as_str().to_string()).or_insert(0) += 1;
    }

    pub fn dec(&mut self, status: DeviceStatus) {
        let entry = self.0.entry(status.as_str().to_string()).or_insert(0);
        *entry = (*entry - 1).max(0);
    }

    /// Total devices across all buckets.
    pub fn total(&self) -> i64 {
        self.0.values().sum()
    }

    /// Devices in a terminal bucket.
    pub fn finished(&self) -> i64 {
        ALL_STATUSES
            .iter()
            .filter(|s| s.is_terminal())
            .map(|s| self.get(*s))
            .sum()
    }

    /// Devices in any bucket other than pending.
    pub fn started(&self) -> i64 {
        self.total() - self.get(DeviceStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in ALL_STATUSES {
            assert_eq!(DeviceStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(DeviceStatus::parse("unknown").is_err());
    }

    #[test]
    fn test_terminal_partition() {
        for status in ACTIVE_STATUSES {
            assert!(status.is_active());
        }
        for status in [
            DeviceStatus::Success,
            DeviceStatus::Failure,
            DeviceStatus::AlreadyInstalled,
            DeviceStatus::NoArtifact,
            DeviceStatus::Aborted,
            DeviceStatus::Decommissioned,
        ] {
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn test_forward_transitions() {
        use DeviceStatus::*;
        assert_eq!(verify_transition(Pending, Downloading).unwrap(), Transition::Apply);
        assert_eq!(verify_transition(Downloading, Installing).unwrap(), Transition::Apply);
        assert_eq!(
            verify_transition(Installing, PauseBeforeRebooting).unwrap(),
            Transition::Apply
        );
        assert_eq!(verify_transition(Rebooting, Success).unwrap(), Transition::Apply);
        // Skipping checkpoints is fine.
        assert_eq!(verify_transition(Pending, Rebooting).unwrap(), Transition::Apply);
        assert_eq!(verify_transition(Downloading, Failure).unwrap(), Transition::Apply);
    }

    #[test]
    fn test_backward_transitions_rejected() {
        use DeviceStatus::*;
        assert!(verify_transition(Rebooting, Downloading).is_err());
        assert!(verify_transition(Installing, Downloading).is_err());
        assert!(verify_transition(Downloading, Pending).is_err());
    }

    #[test]
    fn test_terminal_is_final() {
        use DeviceStatus::*;
        for terminal in [Success, Failure, AlreadyInstalled, NoArtifact, Aborted] {
            // Repeating the same terminal status is a no-op.
            assert_eq!(verify_transition(terminal, terminal).unwrap(), Transition::Noop);
            // Anything else is rejected.
            for next in ALL_STATUSES {
                if next != terminal {
                    assert!(
                        verify_transition(terminal, next).is_err(),
                        "{terminal} -> {next} must be rejected"
                    );
                }
            }
        }
    }

    #[test]
    fn test_side_entries_only_from_pending() {
        use DeviceStatus::*;
        assert_eq!(
            verify_transition(Pending, AlreadyInstalled).unwrap(),
            Transition::Apply
        );
        assert_eq!(verify_transition(Pending, NoArtifact).unwrap(), Transition::Apply);
        assert!(verify_transition(Downloading, AlreadyInstalled).is_err());
        assert!(verify_transition(Installing, NoArtifact).is_err());
    }

    #[test]
    fn test_report_validation() {
        let ok = StatusReport {
            status: DeviceStatus::Downloading,
            substate: Some("fetching".to_string()),
        };
        assert!(ok.validate().is_ok());

        let server_only = StatusReport {
            status: DeviceStatus::Aborted,
            substate: None,
        };
        assert!(server_only.validate().is_err());

        let oversized = StatusReport {
            status: DeviceStatus::Installing,
            substate: Some("x".repeat(SUBSTATE_MAX_LEN + 1)),
        };
        assert!(oversized.validate().is_err());
    }

    #[test]
    fn test_stats_buckets_conserved() {
        let mut stats = Stats::new();
        stats.set(DeviceStatus::Pending, 3);
        assert_eq!(stats.total(), 3);

        stats.dec(DeviceStatus::Pending);
        stats.inc(DeviceStatus::Downloading);
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.get(DeviceStatus::Downloading), 1);

        stats.dec(DeviceStatus::Downloading);
        stats.inc(DeviceStatus::Success);
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.finished(), 1);
        assert_eq!(stats.started(), 1);
    }
}
