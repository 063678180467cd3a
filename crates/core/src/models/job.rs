//! Computation job records

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a computation job. `Completed` and `Failed` are
/// terminal and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Binding of a leased asset to a variable name inside the script. Opaque to
/// the engine; forwarded into the sandbox environment as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputBinding {
    pub asset_id: String,
    pub variable_name: String,
}

/// A computation request as captured at admission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeRequest {
    /// Proposal id or bare on-chain lease id; resolved against the lease
    /// registry at admission.
    pub lease_ref: String,
    pub script: String,
    pub inputs: Vec<InputBinding>,
    /// Caller identity, checked against the lease spender.
    pub actor: String,
}

/// Successful computation outcome: captured stdout plus artifacts keyed by
/// filename, base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeOutput {
    pub output: String,
    pub artifacts: BTreeMap<String, String>,
}

/// One asynchronous computation. Exactly one of `result` / `error` is set
/// once the job is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub computation_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub request: ComputeRequest,
    pub result: Option<ComputeOutput>,
    pub error: Option<String>,
}

impl Job {
    pub fn pending(computation_id: impl Into<String>, request: ComputeRequest) -> Self {
        let now = Utc::now();
        Self {
            computation_id: computation_id.into(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            request,
            result: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ComputeRequest {
        ComputeRequest {
            lease_ref: "lease_prop_01".to_string(),
            script: "echo hi".to_string(),
            inputs: vec![],
            actor: "0xAA".to_string(),
        }
    }

    #[test]
    fn test_pending_job_has_neither_result_nor_error() {
        let job = Job::pending("comp_1", request());
        assert_eq!(job.status, JobStatus::Pending);
        assert!(!job.is_terminal());
        assert!(job.result.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_input_binding_wire_shape() {
        let binding = InputBinding {
            asset_id: "asset-1".to_string(),
            variable_name: "df".to_string(),
        };
        let json = serde_json::to_value(&binding).unwrap();
        assert_eq!(json["assetId"], "asset-1");
        assert_eq!(json["variableName"], "df");
    }
}
