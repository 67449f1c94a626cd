//! Cluster failure status: the single `failureReason`/`failureMessage` slot
//! on a cluster's status.
//!
//! The slot is modelled as a sum type so that reason and message are always
//! set and cleared together. Transitions only touch the in-memory object;
//! writing it back to the cluster store is the caller's job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Why a cluster was marked failed.
///
/// Other controllers write reasons of their own into the same slot, so
/// unrecognised values are carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FailureReason {
    EksaVersionInvalid,
    MissingEksaRelease,
    ClusterInvalid,
    ManagementClusterRefInvalid,
    Other(String),
}

impl FromStr for FailureReason {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "EksaVersionInvalid" => FailureReason::EksaVersionInvalid,
            "MissingEksaRelease" => FailureReason::MissingEksaRelease,
            "ClusterInvalid" => FailureReason::ClusterInvalid,
            "ManagementClusterRefInvalid" => FailureReason::ManagementClusterRefInvalid,
            other => FailureReason::Other(other.to_string()),
        })
    }
}

impl From<String> for FailureReason {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(reason) => reason,
            Err(never) => match never {},
        }
    }
}

impl From<FailureReason> for String {
    fn from(reason: FailureReason) -> Self {
        reason.to_string()
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::EksaVersionInvalid => write!(f, "EksaVersionInvalid"),
            FailureReason::MissingEksaRelease => write!(f, "MissingEksaRelease"),
            FailureReason::ClusterInvalid => write!(f, "ClusterInvalid"),
            FailureReason::ManagementClusterRefInvalid => write!(f, "ManagementClusterRefInvalid"),
            FailureReason::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FailureStatus {
    #[default]
    Clear,
    Failed {
        reason: FailureReason,
        message: String,
    },
}

impl FailureStatus {
    /// Record a failure, replacing whatever was there.
    pub fn set_failure(&mut self, reason: FailureReason, message: impl Into<String>) {
        *self = FailureStatus::Failed {
            reason,
            message: message.into(),
        };
    }

    /// Clear the slot only if it currently holds `reason`. Returns whether
    /// anything changed.
    pub fn clear_if_reason(&mut self, reason: &FailureReason) -> bool {
        match self {
            FailureStatus::Failed { reason: current, .. } if current == reason => {
                *self = FailureStatus::Clear;
                true
            }
            _ => false,
        }
    }

    pub fn is_clear(&self) -> bool {
        matches!(self, FailureStatus::Clear)
    }

    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            FailureStatus::Failed { reason, .. } => Some(reason),
            FailureStatus::Clear => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            FailureStatus::Failed { message, .. } => Some(message),
            FailureStatus::Clear => None,
        }
    }
}

/// Wire form of the cluster status subresource fields this crate owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatusFields {
    #[serde(default)]
    pub failure_reason: Option<FailureReason>,
    #[serde(default)]
    pub failure_message: Option<String>,
}

impl From<ClusterStatusFields> for FailureStatus {
    fn from(raw: ClusterStatusFields) -> Self {
        match raw.failure_reason {
            Some(reason) => FailureStatus::Failed {
                reason,
                message: raw.failure_message.unwrap_or_default(),
            },
            // A message without a reason is a half-cleared slot; treat it as clear.
            None => FailureStatus::Clear,
        }
    }
}

impl From<FailureStatus> for ClusterStatusFields {
    fn from(status: FailureStatus) -> Self {
        match status {
            FailureStatus::Clear => ClusterStatusFields::default(),
            FailureStatus::Failed { reason, message } => ClusterStatusFields {
                failure_reason: Some(reason),
                failure_message: Some(message),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_failure_overwrites() {
        let mut status = FailureStatus::Clear;
        status.set_failure(FailureReason::ClusterInvalid, "first");
        status.set_failure(FailureReason::EksaVersionInvalid, "second");
        assert_eq!(status.reason(), Some(&FailureReason::EksaVersionInvalid));
        assert_eq!(status.message(), Some("second"));
    }

    #[test]
    fn clear_if_reason_only_clears_matching_reason() {
        let mut status = FailureStatus::Clear;
        status.set_failure(FailureReason::MissingEksaRelease, "no release");

        assert!(!status.clear_if_reason(&FailureReason::EksaVersionInvalid));
        assert_eq!(status.reason(), Some(&FailureReason::MissingEksaRelease));

        assert!(status.clear_if_reason(&FailureReason::MissingEksaRelease));
        assert!(status.is_clear());
        assert_eq!(status.message(), None);

        // Second clear is a no-op
        assert!(!status.clear_if_reason(&FailureReason::MissingEksaRelease));
        assert!(status.is_clear());
    }

    #[test]
    fn unknown_reasons_survive_a_round_trip() {
        let raw: ClusterStatusFields = serde_yaml::from_str(
            "failureReason: MachineHealthCheckFailed\nfailureMessage: node down\n",
        )
        .unwrap();
        let status = FailureStatus::from(raw.clone());
        assert_eq!(
            status.reason(),
            Some(&FailureReason::Other("MachineHealthCheckFailed".into()))
        );
        assert_eq!(ClusterStatusFields::from(status), raw);
    }

    #[test]
    fn message_without_reason_reads_as_clear() {
        let raw: ClusterStatusFields = serde_yaml::from_str("failureMessage: stale\n").unwrap();
        assert!(FailureStatus::from(raw).is_clear());
    }

    #[test]
    fn clear_serializes_as_nulls() {
        let json = serde_json::to_value(ClusterStatusFields::from(FailureStatus::Clear)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"failureReason": null, "failureMessage": null})
        );
    }
}
