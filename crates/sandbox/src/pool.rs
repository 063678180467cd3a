//! Fixed-capacity warm pool of ready sandboxes.
//!
//! `start` provisions up to capacity in the background; `acquire` hands out
//! exclusive ownership with a bounded wait; `release` either sanitizes and
//! requeues the sandbox or destroys it and provisions a replacement. The
//! number of provisioned sandboxes never exceeds the configured capacity.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::PoolError;
use crate::substrate::{Sandbox, SandboxProvider};

const PROVISION_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Post-use disposition of a borrowed sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The job finished cleanly; sanitize, probe, and reuse.
    Ok,
    /// The job misbehaved or failed; destroy unconditionally and replace.
    Tainted,
}

struct PoolInner {
    provider: Arc<dyn SandboxProvider>,
    capacity: usize,
    idle: Mutex<VecDeque<Box<dyn Sandbox>>>,
    // Permit count always equals the idle queue length.
    available: Semaphore,
    stopped: AtomicBool,
}

/// Warm pool of sandboxes, cheap to clone via `Arc` in the surrounding state.
pub struct SandboxPool {
    inner: Arc<PoolInner>,
}

impl SandboxPool {
    pub fn new(provider: Arc<dyn SandboxProvider>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                provider,
                capacity,
                idle: Mutex::new(VecDeque::with_capacity(capacity)),
                available: Semaphore::new(0),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of sandboxes currently idle in the pool.
    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// Kick off background provisioning up to capacity. Returns immediately;
    /// `acquire` callers bridge the warm-up gap via their timeout.
    pub fn start(&self) {
        info!(capacity = self.inner.capacity, "warming sandbox pool");
        for _ in 0..self.inner.capacity {
            spawn_provision(Arc::clone(&self.inner));
        }
    }

    /// Wait up to `timeout` for an idle sandbox and take exclusive ownership
    /// of it.
    pub async fn acquire(&self, timeout: Duration) -> Result<PooledSandbox, PoolError> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(PoolError::Stopped);
        }

        let permit = match tokio::time::timeout(timeout, self.inner.available.acquire()).await {
            Ok(Ok(permit)) => permit,
            // Semaphore closed by stop().
            Ok(Err(_)) => return Err(PoolError::Stopped),
            Err(_) => return Err(PoolError::Timeout),
        };
        permit.forget();

        match self.inner.idle.lock().pop_front() {
            Some(sandbox) => {
                debug!(sandbox_id = %sandbox.id(), "sandbox checked out");
                Ok(PooledSandbox {
                    sandbox: Some(sandbox),
                    pool: Arc::downgrade(&self.inner),
                })
            }
            // stop() drained the queue between our permit and the pop.
            None => Err(PoolError::Stopped),
        }
    }

    /// Return a borrowed sandbox. `Verdict::Ok` sanitizes and probes before
    /// requeueing; any failure there, or a `Tainted` verdict, destroys the
    /// sandbox and provisions a replacement asynchronously.
    pub async fn release(&self, mut handle: PooledSandbox, verdict: Verdict) {
        let Some(sandbox) = handle.sandbox.take() else {
            return;
        };
        release_sandbox(Arc::clone(&self.inner), sandbox, verdict).await;
    }

    /// Refuse further acquires, drain the idle queue, and destroy every
    /// sandbox the pool still owns. Outstanding borrows are destroyed on
    /// release.
    pub async fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("stopping sandbox pool");
        self.inner.available.close();

        let drained: Vec<Box<dyn Sandbox>> = {
            let mut idle = self.inner.idle.lock();
            idle.drain(..).collect()
        };
        for sandbox in drained {
            if let Err(e) = sandbox.destroy().await {
                warn!(sandbox_id = %sandbox.id(), "sandbox destroy failed during stop: {}", e);
            }
        }
    }
}

impl Clone for SandboxPool {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Exclusive borrow of one sandbox. Hand it back with
/// [`SandboxPool::release`]; a handle dropped without release is treated as
/// tainted so the pool returns to capacity.
pub struct PooledSandbox {
    sandbox: Option<Box<dyn Sandbox>>,
    pool: Weak<PoolInner>,
}

impl std::fmt::Debug for PooledSandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSandbox")
            .field("id", &self.sandbox.as_ref().map(|s| s.id()))
            .finish()
    }
}

impl PooledSandbox {
    pub fn id(&self) -> &str {
        self.sandbox().id()
    }

    pub fn sandbox(&self) -> &dyn Sandbox {
        self.sandbox
            .as_deref()
            .expect("sandbox handle used after release")
    }
}

impl Drop for PooledSandbox {
    fn drop(&mut self) {
        let Some(sandbox) = self.sandbox.take() else {
            return;
        };
        let Some(inner) = self.pool.upgrade() else {
            return;
        };
        warn!(
            sandbox_id = %sandbox.id(),
            "sandbox handle dropped without release, treating as tainted"
        );
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            rt.spawn(async move {
                destroy_and_replace(inner, sandbox).await;
            });
        }
    }
}

fn spawn_provision(inner: Arc<PoolInner>) {
    tokio::spawn(async move {
        loop {
            if inner.stopped.load(Ordering::SeqCst) {
                return;
            }
            match inner.provider.provision().await {
                Ok(sandbox) => {
                    let id = sandbox.id().to_string();
                    {
                        let mut idle = inner.idle.lock();
                        if inner.stopped.load(Ordering::SeqCst) {
                            drop(idle);
                            if let Err(e) = sandbox.destroy().await {
                                warn!(sandbox_id = %id, "sandbox destroy failed during stop: {}", e);
                            }
                            return;
                        }
                        idle.push_back(sandbox);
                    }
                    inner.available.add_permits(1);
                    debug!(sandbox_id = %id, "sandbox ready");
                    return;
                }
                Err(e) => {
                    warn!("sandbox provisioning failed, retrying: {}", e);
                    tokio::time::sleep(PROVISION_RETRY_DELAY).await;
                }
            }
        }
    });
}

async fn release_sandbox(inner: Arc<PoolInner>, sandbox: Box<dyn Sandbox>, verdict: Verdict) {
    let id = sandbox.id().to_string();

    if inner.stopped.load(Ordering::SeqCst) {
        if let Err(e) = sandbox.destroy().await {
            warn!(sandbox_id = %id, "sandbox destroy failed after stop: {}", e);
        }
        return;
    }

    match verdict {
        Verdict::Ok => {
            let fit = async {
                sandbox.sanitize().await?;
                sandbox.probe().await
            }
            .await;
            match fit {
                Ok(()) => {
                    {
                        let mut idle = inner.idle.lock();
                        if inner.stopped.load(Ordering::SeqCst) {
                            drop(idle);
                            if let Err(e) = sandbox.destroy().await {
                                warn!(sandbox_id = %id, "sandbox destroy failed after stop: {}", e);
                            }
                            return;
                        }
                        idle.push_back(sandbox);
                    }
                    inner.available.add_permits(1);
                    debug!(sandbox_id = %id, "sandbox returned to pool");
                }
                Err(e) => {
                    warn!(sandbox_id = %id, "sandbox failed post-job checks, replacing: {}", e);
                    destroy_and_replace(inner, sandbox).await;
                }
            }
        }
        Verdict::Tainted => {
            info!(sandbox_id = %id, "destroying tainted sandbox");
            destroy_and_replace(inner, sandbox).await;
        }
    }
}

async fn destroy_and_replace(inner: Arc<PoolInner>, sandbox: Box<dyn Sandbox>) {
    if let Err(e) = sandbox.destroy().await {
        warn!(sandbox_id = %sandbox.id(), "sandbox destroy failed: {}", e);
    }
    if !inner.stopped.load(Ordering::SeqCst) {
        spawn_provision(inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SandboxError;
    use crate::substrate::ExecOutput;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    // -----------------------------------------------------------------------
    // Fakes
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct Counters {
        provisioned: AtomicUsize,
        destroyed: AtomicUsize,
        sanitized: AtomicUsize,
    }

    struct FakeSandbox {
        id: String,
        counters: Arc<Counters>,
        fail_probe: bool,
    }

    #[async_trait]
    impl Sandbox for FakeSandbox {
        fn id(&self) -> &str {
            &self.id
        }

        async fn exec(&self, _script: &str) -> crate::error::Result<ExecOutput> {
            Ok(ExecOutput::default())
        }

        async fn sanitize(&self) -> crate::error::Result<()> {
            self.counters.sanitized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn probe(&self) -> crate::error::Result<()> {
            if self.fail_probe {
                Err(SandboxError::Probe("probe rigged to fail".to_string()))
            } else {
                Ok(())
            }
        }

        async fn destroy(&self) -> crate::error::Result<()> {
            self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeProvider {
        counters: Arc<Counters>,
        fail_probe: bool,
    }

    impl FakeProvider {
        fn new(counters: Arc<Counters>) -> Self {
            Self {
                counters,
                fail_probe: false,
            }
        }
    }

    #[async_trait]
    impl SandboxProvider for FakeProvider {
        async fn provision(&self) -> crate::error::Result<Box<dyn Sandbox>> {
            let n = self.counters.provisioned.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSandbox {
                id: format!("fake_{}", n),
                counters: Arc::clone(&self.counters),
                fail_probe: self.fail_probe,
            }))
        }
    }

    /// Provider whose provisioning never completes; the pool stays empty.
    struct StalledProvider;

    #[async_trait]
    impl SandboxProvider for StalledProvider {
        async fn provision(&self) -> crate::error::Result<Box<dyn Sandbox>> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached within deadline");
    }

    fn pool_with_counters(capacity: usize) -> (SandboxPool, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let provider = Arc::new(FakeProvider::new(Arc::clone(&counters)));
        (SandboxPool::new(provider, capacity), counters)
    }

    // -----------------------------------------------------------------------
    // Warm-up and acquire
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_start_fills_pool_to_capacity() {
        let (pool, counters) = pool_with_counters(3);
        pool.start();
        wait_for(|| pool.idle_count() == 3).await;
        assert_eq!(counters.provisioned.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_acquire_waits_out_warmup() {
        let (pool, _counters) = pool_with_counters(1);
        pool.start();
        // Even if the background fill has not finished yet, the acquire
        // deadline covers the gap.
        let handle = pool.acquire(Duration::from_secs(1)).await.unwrap();
        assert_eq!(handle.id(), "fake_0");
        pool.release(handle, Verdict::Ok).await;
    }

    #[tokio::test]
    async fn test_acquire_times_out_when_pool_never_fills() {
        let pool = SandboxPool::new(Arc::new(StalledProvider), 2);
        pool.start();
        let err = pool.acquire(Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err, PoolError::Timeout);
    }

    #[tokio::test]
    async fn test_acquire_exhausts_capacity_then_times_out() {
        let (pool, _counters) = pool_with_counters(1);
        pool.start();
        let held = pool.acquire(Duration::from_secs(1)).await.unwrap();
        let err = pool.acquire(Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err, PoolError::Timeout);
        pool.release(held, Verdict::Ok).await;
        // Released sandbox is available again.
        let again = pool.acquire(Duration::from_secs(1)).await.unwrap();
        pool.release(again, Verdict::Ok).await;
    }

    // -----------------------------------------------------------------------
    // Release paths
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_clean_release_sanitizes_and_reuses() {
        let (pool, counters) = pool_with_counters(1);
        pool.start();
        let handle = pool.acquire(Duration::from_secs(1)).await.unwrap();
        let first_id = handle.id().to_string();
        pool.release(handle, Verdict::Ok).await;

        assert_eq!(counters.sanitized.load(Ordering::SeqCst), 1);
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 0);

        let handle = pool.acquire(Duration::from_secs(1)).await.unwrap();
        assert_eq!(handle.id(), first_id, "same sandbox reused, not replaced");
        pool.release(handle, Verdict::Ok).await;
    }

    #[tokio::test]
    async fn test_tainted_release_destroys_and_replaces() {
        let (pool, counters) = pool_with_counters(1);
        pool.start();
        let handle = pool.acquire(Duration::from_secs(1)).await.unwrap();
        let first_id = handle.id().to_string();
        pool.release(handle, Verdict::Tainted).await;

        wait_for(|| pool.idle_count() == 1).await;
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(counters.provisioned.load(Ordering::SeqCst), 2);

        let replacement = pool.acquire(Duration::from_secs(1)).await.unwrap();
        assert_ne!(replacement.id(), first_id);
        pool.release(replacement, Verdict::Ok).await;
    }

    #[tokio::test]
    async fn test_probe_failure_on_release_replaces() {
        let counters = Arc::new(Counters::default());
        let provider = Arc::new(FakeProvider {
            counters: Arc::clone(&counters),
            fail_probe: true,
        });
        let pool = SandboxPool::new(provider, 1);
        pool.start();

        let handle = pool.acquire(Duration::from_secs(1)).await.unwrap();
        pool.release(handle, Verdict::Ok).await;

        // Probe failed, so the sandbox was destroyed and a replacement
        // provisioned; the pool returns to capacity without operator action.
        wait_for(|| pool.idle_count() == 1).await;
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(counters.provisioned.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dropped_handle_counts_as_tainted() {
        let (pool, counters) = pool_with_counters(1);
        pool.start();
        let handle = pool.acquire(Duration::from_secs(1)).await.unwrap();
        drop(handle);

        wait_for(|| pool.idle_count() == 1).await;
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(counters.provisioned.load(Ordering::SeqCst), 2);
    }

    // -----------------------------------------------------------------------
    // Capacity invariant
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_checked_out_never_exceeds_capacity() {
        let (pool, _counters) = pool_with_counters(2);
        pool.start();

        let checked_out = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let pool = pool.clone();
            let checked_out = Arc::clone(&checked_out);
            let max_seen = Arc::clone(&max_seen);
            tasks.push(tokio::spawn(async move {
                let handle = match pool.acquire(Duration::from_secs(5)).await {
                    Ok(h) => h,
                    Err(_) => return,
                };
                let now = checked_out.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                checked_out.fetch_sub(1, Ordering::SeqCst);
                pool.release(handle, Verdict::Ok).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_stop_refuses_acquire_and_destroys_idle() {
        let (pool, counters) = pool_with_counters(2);
        pool.start();
        wait_for(|| pool.idle_count() == 2).await;

        pool.stop().await;
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 2);
        assert_eq!(pool.idle_count(), 0);

        let err = pool.acquire(Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err, PoolError::Stopped);
    }

    #[tokio::test]
    async fn test_stop_wakes_blocked_acquirers() {
        let pool = SandboxPool::new(Arc::new(StalledProvider), 1);
        pool.start();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire(Duration::from_secs(30)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.stop().await;

        let result = waiter.await.unwrap();
        assert_eq!(result.unwrap_err(), PoolError::Stopped);
    }

    #[tokio::test]
    async fn test_release_after_stop_destroys_outstanding_borrow() {
        let (pool, counters) = pool_with_counters(1);
        pool.start();
        let handle = pool.acquire(Duration::from_secs(1)).await.unwrap();

        pool.stop().await;
        pool.release(handle, Verdict::Ok).await;

        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 0);
    }
}
