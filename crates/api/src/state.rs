//! Shared application state for the HTTP surface

use std::sync::Arc;

use tokio::sync::watch;

use pactum_core::{ComputationEngine, LeaseRegistry, ProposalIntake};

pub struct AppState {
    pub intake: ProposalIntake,
    pub leases: Arc<LeaseRegistry>,
    pub engine: ComputationEngine,
    pub version: String,
    shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(
        intake: ProposalIntake,
        leases: Arc<LeaseRegistry>,
        engine: ComputationEngine,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            intake,
            leases,
            engine,
            version: env!("CARGO_PKG_VERSION").to_string(),
            shutdown,
        }
    }

    /// New submissions are refused once the process-wide shutdown begins;
    /// polls keep working so clients can observe final states.
    pub fn accepting_requests(&self) -> bool {
        !*self.shutdown.borrow()
    }
}
