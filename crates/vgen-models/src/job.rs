//! Remote generation jobs as seen by the client.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Server-issued job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for capacity
    #[default]
    Pending,
    /// Actively generating
    Running,
    /// Finished with a result
    Succeeded,
    /// Finished with an error
    Failed,
    /// Stopped before completion
    Cancelled,
    /// Status string the client does not recognize
    Unknown,
}

impl JobStatus {
    /// Map the server's status vocabulary onto the closed enum.
    ///
    /// Unrecognized values map to [`JobStatus::Unknown`].
    pub fn from_server(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "queued" | "pending" | "preprocessing" => JobStatus::Pending,
            "processing" | "running" | "in_progress" => JobStatus::Running,
            "succeeded" | "completed" => JobStatus::Succeeded,
            "failed" => JobStatus::Failed,
            "cancelled" | "canceled" => JobStatus::Cancelled,
            _ => JobStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Unknown => "unknown",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Latest observed state of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    /// Download URL; always present when `status` is `Succeeded`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Progress percentage (0-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl JobSnapshot {
    /// Snapshot for a job that has not succeeded.
    ///
    /// Use [`JobSnapshot::succeeded`] for finished jobs so the result URL is
    /// always present.
    pub fn in_status(id: JobId, status: JobStatus) -> Self {
        debug_assert!(status != JobStatus::Succeeded);
        Self {
            id,
            status,
            result_url: None,
            error_message: None,
            error_code: None,
            created_at: None,
            updated_at: None,
            completed_at: None,
            progress: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Snapshot for a finished job with its result URL.
    pub fn succeeded(id: JobId, result_url: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Succeeded,
            result_url: Some(result_url.into()),
            progress: Some(100),
            ..Self::in_status(id, JobStatus::Pending)
        }
    }

    pub fn with_error(mut self, message: Option<String>, code: Option<String>) -> Self {
        self.error_message = message;
        self.error_code = code;
        self
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Replace this snapshot with a newer poll result.
    ///
    /// Terminal snapshots are final: returns `false` and keeps the current
    /// state when `self` is already terminal or `next` is for another job.
    pub fn overlay(&mut self, next: JobSnapshot) -> bool {
        if self.is_terminal() || self.id != next.id {
            return false;
        }
        *self = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_is_total() {
        let cases = [
            ("queued", JobStatus::Pending),
            ("preprocessing", JobStatus::Pending),
            ("processing", JobStatus::Running),
            ("running", JobStatus::Running),
            ("succeeded", JobStatus::Succeeded),
            ("failed", JobStatus::Failed),
            ("cancelled", JobStatus::Cancelled),
            ("definitely-not-a-status", JobStatus::Unknown),
            ("", JobStatus::Unknown),
        ];

        for (raw, expected) in cases {
            assert_eq!(JobStatus::from_server(raw), expected, "status '{}'", raw);
        }
    }

    #[test]
    fn test_status_mapping_ignores_case() {
        assert_eq!(JobStatus::from_server("Succeeded"), JobStatus::Succeeded);
        assert_eq!(JobStatus::from_server(" QUEUED "), JobStatus::Pending);
        assert_eq!(JobStatus::from_server("Canceled"), JobStatus::Cancelled);
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_succeeded_snapshot_has_url() {
        let snapshot = JobSnapshot::succeeded(JobId::from("job-1"), "https://example.com/v.mp4");
        assert_eq!(snapshot.status, JobStatus::Succeeded);
        assert_eq!(snapshot.result_url.as_deref(), Some("https://example.com/v.mp4"));
        assert_eq!(snapshot.progress, Some(100));
    }

    #[test]
    fn test_overlay_stops_at_terminal() {
        let id = JobId::from("job-1");
        let mut held = JobSnapshot::in_status(id.clone(), JobStatus::Pending);

        assert!(held.overlay(JobSnapshot::in_status(id.clone(), JobStatus::Running).with_progress(40)));
        assert_eq!(held.status, JobStatus::Running);
        assert_eq!(held.progress, Some(40));

        assert!(held.overlay(JobSnapshot::in_status(id.clone(), JobStatus::Failed)));
        assert!(!held.overlay(JobSnapshot::in_status(id.clone(), JobStatus::Running)));
        assert_eq!(held.status, JobStatus::Failed);
    }

    #[test]
    fn test_overlay_rejects_other_job() {
        let mut held = JobSnapshot::in_status(JobId::from("job-1"), JobStatus::Pending);
        assert!(!held.overlay(JobSnapshot::in_status(JobId::from("job-2"), JobStatus::Running)));
        assert_eq!(held.id.as_str(), "job-1");
    }

    #[test]
    fn test_snapshot_serialization_skips_empty() {
        let snapshot = JobSnapshot::in_status(JobId::from("job-1"), JobStatus::Running);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "running");
        assert!(json.get("result_url").is_none());
        assert!(json.get("metadata").is_none());
    }
}
