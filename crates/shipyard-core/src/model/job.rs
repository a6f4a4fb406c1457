//! Provisioning job status records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shipyard_cloud::KeyPairMaterial;
use std::fmt;
use uuid::Uuid;

/// Opaque token identifying one run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OperationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Completed,
    Failed,
    Unknown,
}

impl JobStatus {
    /// Terminal jobs are never modified again
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A created resource: kind plus id or URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDetail {
    pub kind: String,
    pub id: String,
}

impl ResourceDetail {
    pub fn new(kind: impl Into<String>, id: impl ToString) -> Self {
        Self {
            kind: kind.into(),
            id: id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningJob {
    pub operation_id: OperationId,
    pub status: JobStatus,
    /// Current message; the error text once failed
    pub message: String,
    /// Filled only when `completed`
    pub details: Vec<ResourceDetail>,
    pub step_log: Vec<StepLogEntry>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Bumped by the store on every write
    pub revision: u64,
    /// Private key of a key pair minted by this run; never serialized
    #[serde(skip)]
    pub generated_key: Option<KeyPairMaterial>,
}

impl ProvisioningJob {
    pub fn started(operation_id: OperationId, message: impl Into<String>) -> Self {
        let now = Utc::now();
        let message = message.into();
        Self {
            operation_id,
            status: JobStatus::InProgress,
            step_log: vec![StepLogEntry {
                at: now,
                message: message.clone(),
            }],
            message,
            details: Vec::new(),
            started_at: Some(now),
            finished_at: None,
            revision: 0,
            generated_key: None,
        }
    }

    /// Answer for an id the store has never seen
    pub fn unknown(operation_id: OperationId) -> Self {
        Self {
            operation_id,
            status: JobStatus::Unknown,
            message: "unknown operation id".to_string(),
            details: Vec::new(),
            step_log: Vec::new(),
            started_at: None,
            finished_at: None,
            revision: 0,
            generated_key: None,
        }
    }

    /// Record a progress message
    pub fn progress(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.step_log.push(StepLogEntry {
            at: Utc::now(),
            message: message.clone(),
        });
        self.message = message;
    }

    /// Append to the log without changing the current message
    pub fn note(&mut self, message: impl Into<String>) {
        self.step_log.push(StepLogEntry {
            at: Utc::now(),
            message: message.into(),
        });
    }

    /// Keep a minted private key; it survives both completion and failure
    pub fn record_key(&mut self, key: KeyPairMaterial) {
        self.note(format!("Created key pair {}", key.name));
        self.generated_key = Some(key);
    }

    pub fn complete(&mut self, details: Vec<ResourceDetail>) {
        self.progress("Infrastructure setup completed successfully");
        self.status = JobStatus::Completed;
        self.details = details;
        self.finished_at = Some(Utc::now());
    }

    /// Clears details but keeps a recorded private key
    pub fn fail(&mut self, message: impl Into<String>) {
        self.progress(message);
        self.status = JobStatus::Failed;
        self.details.clear();
        self.finished_at = Some(Utc::now());
    }

    /// First detail of `kind`
    pub fn detail(&self, kind: &str) -> Option<&str> {
        self.details
            .iter()
            .find(|d| d.kind == kind)
            .map(|d| d.id.as_str())
    }

    pub fn details_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.details
            .iter()
            .filter(move |d| d.kind == kind)
            .map(|d| d.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> KeyPairMaterial {
        KeyPairMaterial {
            name: "demo-key".into(),
            key_pair_id: "key-1".into(),
            private_key: "PRIVATE".into(),
        }
    }

    #[test]
    fn test_lifecycle() {
        let mut job = ProvisioningJob::started(OperationId::from("op-1"), "Starting");
        assert_eq!(job.status, JobStatus::InProgress);
        job.progress("Creating VPC...");
        job.complete(vec![ResourceDetail::new("vpc", "vpc-123")]);

        assert!(job.status.is_terminal());
        assert_eq!(job.detail("vpc"), Some("vpc-123"));
        assert_eq!(job.step_log.len(), 3);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_failure_clears_details() {
        let mut job = ProvisioningJob::started(OperationId::from("op-2"), "Starting");
        job.details.push(ResourceDetail::new("vpc", "vpc-123"));
        job.fail("network stage failed: boom");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.message, "network stage failed: boom");
        assert!(job.details.is_empty());
    }

    #[test]
    fn test_failure_keeps_recorded_key() {
        let mut job = ProvisioningJob::started(OperationId::from("op-4"), "Starting");
        job.record_key(key());
        job.fail("service stage failed: boom");

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.generated_key.map(|k| k.private_key), Some("PRIVATE".into()));
        assert!(job.step_log.iter().any(|e| e.message == "Created key pair demo-key"));
    }

    #[test]
    fn test_generated_key_is_not_serialized() {
        let mut job = ProvisioningJob::started(OperationId::from("op-3"), "Starting");
        job.record_key(key());
        job.complete(Vec::new());
        let json = serde_json::to_string(&job).unwrap();
        assert!(!json.contains("PRIVATE"));
        assert!(json.contains("\"status\":\"completed\""));
    }
}
