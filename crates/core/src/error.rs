//! Error types for the agent core

use thiserror::Error;

use crate::models::LeaseStatus;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation failed: {field}, reason: {detail}")]
    ValidationFailed { field: String, detail: String },

    #[error("Policy rejected proposal: {0}")]
    PolicyRejected(String),

    #[error("Lease not found: {0}")]
    LeaseUnknown(String),

    #[error("Lease is not ready for computation, current status: {0}")]
    LeaseNotReady(LeaseStatus),

    #[error("Caller is not the lease spender")]
    Unauthorized,

    #[error("Script exceeds the maximum size: {size} > {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Invalid lease status transition: {from} -> {to}")]
    InvalidTransition { from: LeaseStatus, to: LeaseStatus },

    #[error("Computation not found: {0}")]
    JobUnknown(String),
}

impl CoreError {
    pub fn validation(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ValidationFailed {
            field: field.into(),
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
