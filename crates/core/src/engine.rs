//! Computation engine: admission checks, job spawning, sandboxed execution.
//!
//! `submit` performs synchronous admission against the lease registry and
//! returns a computation id immediately; the actual run happens in its own
//! task, bounded by the sandbox pool's capacity. Callers observe progress
//! through `get_result`.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::{debug, info, warn};

use pactum_sandbox::{PoolError, SandboxPool, Verdict};

use crate::error::{CoreError, Result};
use crate::models::{ComputeOutput, ComputeRequest, Job, Lease, LeaseStatus};
use crate::registry::{JobRegistry, LeaseRegistry};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long an execution task waits for a warm sandbox.
    pub acquire_timeout: Duration,
    /// Admission cap on script size.
    pub max_script_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(30),
            max_script_bytes: 64 * 1024,
        }
    }
}

pub struct ComputationEngine {
    leases: Arc<LeaseRegistry>,
    jobs: Arc<JobRegistry>,
    pool: SandboxPool,
    config: EngineConfig,
}

impl ComputationEngine {
    pub fn new(
        leases: Arc<LeaseRegistry>,
        jobs: Arc<JobRegistry>,
        pool: SandboxPool,
        config: EngineConfig,
    ) -> Self {
        Self {
            leases,
            jobs,
            pool,
            config,
        }
    }

    /// Admit a computation request and spawn its execution task.
    ///
    /// Admission order: lease exists, lease approved, caller is the lease
    /// spender, script within size cap. The returned id is immediately
    /// pollable; execution failures surface only through the job record.
    pub fn submit(&self, request: ComputeRequest) -> Result<String> {
        let lease = self
            .resolve_lease(&request.lease_ref)
            .ok_or_else(|| CoreError::LeaseUnknown(request.lease_ref.clone()))?;

        if lease.status != LeaseStatus::Approved {
            return Err(CoreError::LeaseNotReady(lease.status));
        }
        if lease.spender_address.as_deref() != Some(request.actor.as_str()) {
            return Err(CoreError::Unauthorized);
        }
        if request.script.len() > self.config.max_script_bytes {
            return Err(CoreError::PayloadTooLarge {
                size: request.script.len(),
                limit: self.config.max_script_bytes,
            });
        }

        let computation_id = self.jobs.create(request);
        info!(
            %computation_id,
            proposal_id = %lease.proposal_id,
            "computation admitted"
        );
        self.spawn_execution(computation_id.clone());
        Ok(computation_id)
    }

    /// Current snapshot of a job; polling is the intended access pattern.
    pub fn get_result(&self, computation_id: &str) -> Option<Job> {
        self.jobs.get(computation_id)
    }

    /// Accept either a proposal id or an on-chain lease id (with or without
    /// `0x`) and resolve it to the lease record.
    fn resolve_lease(&self, lease_ref: &str) -> Option<Lease> {
        if let Some(lease) = self.leases.get(lease_ref) {
            return Some(lease);
        }
        let derived = format!("lease_prop_{}", normalize_lease_ref(lease_ref));
        self.leases.get(&derived)
    }

    fn spawn_execution(&self, computation_id: String) {
        let jobs = Arc::clone(&self.jobs);
        let pool = self.pool.clone();
        let acquire_timeout = self.config.acquire_timeout;
        tokio::spawn(async move {
            run_job(jobs, pool, acquire_timeout, computation_id).await;
        });
    }
}

/// Canonical lower-hex form of a lease reference, matching the hex the
/// ingester stores: no `0x`, no leading zero bytes, even-length.
fn normalize_lease_ref(lease_ref: &str) -> String {
    let bare = lease_ref
        .strip_prefix("0x")
        .or_else(|| lease_ref.strip_prefix("0X"))
        .unwrap_or(lease_ref)
        .to_ascii_lowercase();
    let trimmed = bare.trim_start_matches('0');
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
    if trimmed.len() % 2 == 1 {
        format!("0{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

async fn run_job(
    jobs: Arc<JobRegistry>,
    pool: SandboxPool,
    acquire_timeout: Duration,
    computation_id: String,
) {
    let Some(job) = jobs.get(&computation_id) else {
        warn!(%computation_id, "job vanished before execution");
        return;
    };

    let handle = match pool.acquire(acquire_timeout).await {
        Ok(handle) => handle,
        Err(PoolError::Timeout) => {
            warn!(%computation_id, "no sandbox available before deadline");
            record_failure(&jobs, &computation_id, "pool exhausted: no sandbox available");
            return;
        }
        Err(PoolError::Stopped) => {
            // Shutdown in progress; the job stays pending by design.
            debug!(%computation_id, "pool stopped, leaving job pending");
            return;
        }
    };

    debug!(%computation_id, sandbox_id = %handle.id(), "executing script");
    let verdict = match handle.sandbox().exec(&job.request.script).await {
        Ok(out) if out.success() => {
            let artifacts = out
                .artifacts
                .iter()
                .map(|(name, bytes)| (name.clone(), BASE64.encode(bytes)))
                .collect();
            let result = ComputeOutput {
                output: out.stdout,
                artifacts,
            };
            if let Err(e) = jobs.complete(&computation_id, result) {
                warn!(%computation_id, "failed to record result: {}", e);
            }
            Verdict::Ok
        }
        Ok(out) => {
            let reason = one_line(&out.stderr)
                .map(str::to_string)
                .unwrap_or_else(|| format!("script exited with status {}", out.exit_code));
            record_failure(&jobs, &computation_id, &reason);
            Verdict::Tainted
        }
        Err(e) => {
            record_failure(&jobs, &computation_id, &format!("sandbox failure: {}", e));
            Verdict::Tainted
        }
    };

    pool.release(handle, verdict).await;
}

fn record_failure(jobs: &JobRegistry, computation_id: &str, reason: &str) {
    if let Err(e) = jobs.fail(computation_id, reason) {
        warn!(%computation_id, "failed to record job failure: {}", e);
    }
}

/// First non-empty line, trimmed; execution errors are reported one line at
/// a time.
fn one_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| !line.is_empty())
}
