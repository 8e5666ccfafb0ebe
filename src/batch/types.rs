//! Batch job types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::device::SessionError;

/// Per-device lifecycle: `pending -> running -> success | error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Pending,
    Running,
    Success,
    Error,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Pending => "pending",
            DeviceStatus::Running => "running",
            DeviceStatus::Success => "success",
            DeviceStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeviceStatus::Success | DeviceStatus::Error)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One device's result, in submitted order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub device: String,
    pub status: DeviceStatus,
    pub output: String,
}

impl BatchEntry {
    pub fn success(device: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            status: DeviceStatus::Success,
            output: output.into(),
        }
    }

    pub fn error(device: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            status: DeviceStatus::Error,
            output: output.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub device_names: Vec<String>,
    pub command: String,
}

/// Why a single device ended in `error`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceFailure {
    #[error("unknown device")]
    UnknownDevice,

    #[error("timeout")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("worker exited before reporting a result")]
    WorkerLost,

    #[error("{0}")]
    Session(#[from] SessionError),
}

/// Request-level rejections, raised before any I/O
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("No devices selected")]
    EmptyTargets,

    #[error("Command must not be empty")]
    EmptyCommand,

    #[error("Device '{0}' is listed more than once")]
    DuplicateTarget(String),
}

/// Progress notifications for observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    Started {
        job_id: Uuid,
        command: String,
        devices: Vec<String>,
    },
    State {
        job_id: Uuid,
        index: usize,
        device: String,
        status: DeviceStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    Finished {
        job_id: Uuid,
        results: Vec<BatchEntry>,
    },
}

impl BatchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BatchEvent::Started { .. } => "started",
            BatchEvent::State { .. } => "state",
            BatchEvent::Finished { .. } => "finished",
        }
    }
}

/// Listing entry for an active job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub command: String,
    pub devices: Vec<String>,
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages() {
        assert_eq!(DeviceFailure::UnknownDevice.to_string(), "unknown device");
        assert_eq!(DeviceFailure::Timeout.to_string(), "timeout");
        assert_eq!(DeviceFailure::Cancelled.to_string(), "cancelled");
        assert_eq!(
            DeviceFailure::from(SessionError::AuthFailed("bad password".into())).to_string(),
            "authentication failed: bad password"
        );
    }

    #[test]
    fn test_entry_wire_format() {
        let entry = BatchEntry::success("r1", "Version 1.0");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "device": "r1", "status": "success", "output": "Version 1.0" })
        );
    }

    #[test]
    fn test_event_is_tagged() {
        let event = BatchEvent::State {
            job_id: Uuid::nil(),
            index: 0,
            device: "r1".into(),
            status: DeviceStatus::Running,
            output: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "state");
        assert_eq!(json["status"], "running");
        assert!(json.get("output").is_none());
    }
}
