//! Proposal intake: validate, consult policy, insert pending.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{CoreError, Result};
use crate::ids;
use crate::models::{Lease, ProposalRequest};
use crate::policy::{PolicyDecision, PolicyEngine};
use crate::registry::LeaseRegistry;

pub struct ProposalIntake {
    leases: Arc<LeaseRegistry>,
    policy: Arc<dyn PolicyEngine>,
}

impl ProposalIntake {
    pub fn new(leases: Arc<LeaseRegistry>, policy: Arc<dyn PolicyEngine>) -> Self {
        Self { leases, policy }
    }

    /// Validate the request, run it past the policy engine, and register a
    /// pending lease. Returns the minted proposal id.
    pub fn submit(&self, request: ProposalRequest) -> Result<String> {
        request.validate()?;

        if let PolicyDecision::Deny(reason) = self.policy.evaluate(&request) {
            debug!(product_ref = %request.product_ref, %reason, "proposal denied by policy");
            return Err(CoreError::PolicyRejected(reason));
        }

        let proposal_id = ids::mint_proposal_id();
        self.leases.create_or_get(Lease::pending(
            proposal_id.clone(),
            request.product_ref.clone(),
            request.max_price.clone(),
            request.duration.clone(),
        ));
        info!(
            %proposal_id,
            product_ref = %request.product_ref,
            max_price = %request.max_price,
            duration = %request.duration,
            "accepted lease proposal"
        );
        Ok(proposal_id)
    }
}
