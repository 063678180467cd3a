//! Pactum agent HTTP surface.
//!
//! REST endpoints for lease proposal submission, lease status polling,
//! computation submission, and result polling, plus the configuration and
//! telemetry plumbing for the agent binary.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::AgentConfig;
pub use error::{ApiError, Result};
pub use server::{Server, ServerConfig};
pub use state::AppState;
