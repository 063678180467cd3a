//! Warm sandbox pool for isolated computation.
//!
//! Maintains a fixed-capacity set of pre-provisioned sandboxes so jobs never
//! pay sandbox creation latency on the hot path. The execution substrate is
//! abstracted behind the [`Sandbox`] / [`SandboxProvider`] capability traits;
//! a process-backed substrate is included for development and tests.

pub mod error;
pub mod pool;
pub mod process;
pub mod substrate;

pub use error::{PoolError, Result, SandboxError};
pub use pool::{PooledSandbox, SandboxPool, Verdict};
pub use process::{ProcessSandbox, ProcessSandboxProvider};
pub use substrate::{ExecOutput, Sandbox, SandboxProvider};
