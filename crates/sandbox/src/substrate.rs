//! Capability traits for the execution substrate.
//!
//! The pool and the computation engine depend only on these traits; whether a
//! sandbox is a container, a microVM, or a local process is a provider
//! concern.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;

/// Captured outcome of one script execution inside a sandbox.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Files the script left in the workspace output directory, by filename.
    pub artifacts: BTreeMap<String, Vec<u8>>,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One isolated execution environment.
///
/// A sandbox is exclusively owned by the pool; borrowers receive it through
/// `SandboxPool::acquire` and must hand it back through `release`.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Opaque substrate identifier, stable for the sandbox lifetime.
    fn id(&self) -> &str;

    /// Run a script in the sandbox workspace and capture its outcome.
    async fn exec(&self, script: &str) -> Result<ExecOutput>;

    /// Clear the scratch workspace so the sandbox can be reused.
    async fn sanitize(&self) -> Result<()>;

    /// Cheap health command; any failure marks the sandbox unfit for reuse.
    async fn probe(&self) -> Result<()>;

    /// Tear the sandbox down. Must be idempotent.
    async fn destroy(&self) -> Result<()>;
}

/// Factory for new sandboxes, used by the pool for initial fill and
/// replacements.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    async fn provision(&self) -> Result<Box<dyn Sandbox>>;
}
