//! Domain models for leases, proposals, and computation jobs

pub mod job;
pub mod lease;
pub mod proposal;

pub use job::{ComputeOutput, ComputeRequest, InputBinding, Job, JobStatus};
pub use lease::{Lease, LeaseStatus};
pub use proposal::ProposalRequest;
