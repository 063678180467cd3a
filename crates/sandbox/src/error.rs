//! Error types for the sandbox substrate and pool

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Sandbox provisioning failed: {0}")]
    Provision(String),

    #[error("Script execution failed: {0}")]
    Exec(String),

    #[error("Workspace sanitize failed: {0}")]
    Sanitize(String),

    #[error("Health probe failed: {0}")]
    Probe(String),

    #[error("Sandbox teardown failed: {0}")]
    Destroy(String),

    #[error("Workspace I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SandboxError>;

/// Why an [`crate::pool::SandboxPool::acquire`] call came back empty-handed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("no sandbox became available before the deadline")]
    Timeout,

    #[error("sandbox pool is stopped")]
    Stopped,
}
