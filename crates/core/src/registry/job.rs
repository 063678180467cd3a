//! Computation registry: concurrent map from computation id to job record.
//!
//! Terminal transitions are first-write-wins; a second `complete` or `fail`
//! on the same job is a no-op. Never deleted in-process.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::ids;
use crate::models::{ComputeOutput, ComputeRequest, Job, JobStatus};

#[derive(Default)]
pub struct JobRegistry {
    inner: RwLock<HashMap<String, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a computation id, store the pending job, return the id.
    pub fn create(&self, request: ComputeRequest) -> String {
        let computation_id = ids::mint_computation_id();
        let job = Job::pending(computation_id.clone(), request);
        self.inner.write().insert(computation_id.clone(), job);
        computation_id
    }

    /// Terminal transition to `completed`. No-op if the job is already
    /// terminal.
    pub fn complete(&self, computation_id: &str, result: ComputeOutput) -> Result<Job> {
        self.finish(computation_id, |job| {
            job.status = JobStatus::Completed;
            job.result = Some(result);
        })
    }

    /// Terminal transition to `failed`. No-op if the job is already
    /// terminal.
    pub fn fail(&self, computation_id: &str, error: impl Into<String>) -> Result<Job> {
        let error = error.into();
        self.finish(computation_id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error);
        })
    }

    pub fn get(&self, computation_id: &str) -> Option<Job> {
        self.inner.read().get(computation_id).cloned()
    }

    /// Jobs that have not reached a terminal state yet; used by shutdown to
    /// bound the grace period.
    pub fn pending_count(&self) -> usize {
        self.inner
            .read()
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .count()
    }

    fn finish<F>(&self, computation_id: &str, apply: F) -> Result<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut map = self.inner.write();
        let job = map
            .get_mut(computation_id)
            .ok_or_else(|| CoreError::JobUnknown(computation_id.to_string()))?;

        if job.is_terminal() {
            debug!(
                %computation_id,
                status = %job.status,
                "ignoring terminal transition on finished job"
            );
            return Ok(job.clone());
        }

        let before = job.updated_at;
        apply(job);
        let now = Utc::now();
        job.updated_at = if now > before { now } else { before };
        Ok(job.clone())
    }
}
