//! Request and response bodies for the agent API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pactum_core::{
    ComputeOutput, ComputeRequest, InputBinding, Job, JobStatus, Lease, LeaseStatus,
    ProposalRequest,
};

/// `POST /api/v1/leases` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalBody {
    pub product_id: String,
    pub max_price: String,
    pub duration: String,
}

impl From<ProposalBody> for ProposalRequest {
    fn from(body: ProposalBody) -> Self {
        ProposalRequest {
            product_ref: body.product_id,
            max_price: body.max_price,
            duration: body.duration,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalAccepted {
    pub lease_proposal_id: String,
}

/// `GET /api/v1/leases/:id` response. Price stays a string, never a float.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseStatusResponse {
    pub status: LeaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spender_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earner_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

impl From<Lease> for LeaseStatusResponse {
    fn from(lease: Lease) -> Self {
        Self {
            status: lease.status,
            created_at: lease.created_at,
            updated_at: lease.updated_at,
            lease_id: lease.lease_id.map(|h| format!("0x{}", h)),
            spender_addr: lease.spender_address,
            earner_addr: lease.earner_address,
            price: lease.price,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputBindingBody {
    pub asset_id: String,
    pub variable_name: String,
}

/// `POST /api/v1/computations` body. `actor` normally comes from the
/// request-admission middleware; accepting it in the body keeps the core
/// testable without that layer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputationBody {
    pub lease_id: String,
    pub script: String,
    #[serde(default)]
    pub inputs: Vec<InputBindingBody>,
    #[serde(default)]
    pub actor: String,
}

impl ComputationBody {
    pub fn into_request(self) -> ComputeRequest {
        ComputeRequest {
            lease_ref: self.lease_id,
            script: self.script,
            inputs: self
                .inputs
                .into_iter()
                .map(|b| InputBinding {
                    asset_id: b.asset_id,
                    variable_name: b.variable_name,
                })
                .collect(),
            actor: self.actor,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputationAccepted {
    pub computation_id: String,
}

/// `GET /api/v1/computations/:id` response; a snapshot of the job record.
#[derive(Debug, Serialize)]
pub struct ComputationStatusResponse {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ComputeOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Job> for ComputationStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            status: job.status,
            results: job.result,
            error: job.error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: i64,
}
