//! Lease record and its status lattice

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a lease proposal.
///
/// `Executed` and `Disputed` are reserved terminal states; nothing in the
/// agent transitions into them yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseStatus {
    Pending,
    Approved,
    Executed,
    Disputed,
}

impl LeaseStatus {
    /// The allowed transition lattice: `Pending -> Approved`, plus
    /// idempotent same-state updates. Everything else is rejected.
    pub fn can_transition(self, next: LeaseStatus) -> bool {
        self == next || matches!((self, next), (LeaseStatus::Pending, LeaseStatus::Approved))
    }
}

impl std::fmt::Display for LeaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LeaseStatus::Pending => "pending",
            LeaseStatus::Approved => "approved",
            LeaseStatus::Executed => "executed",
            LeaseStatus::Disputed => "disputed",
        };
        f.write_str(s)
    }
}

/// One lease proposal and, once ratified, its on-chain identity.
///
/// Created by proposal intake (or by the event ingester when the on-chain
/// event wins the race against intake); mutated only through
/// `LeaseRegistry::update`, which enforces the status lattice and the
/// immutability of the approval set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    pub proposal_id: String,
    pub status: LeaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Lower-hex on-chain lease identifier, absent until approval.
    pub lease_id: Option<String>,
    pub spender_address: Option<String>,
    pub earner_address: Option<String>,
    /// Price in the smallest on-chain unit, as a decimal string.
    pub price: Option<String>,
    pub product_ref: String,
    pub max_price: String,
    pub duration: String,
}

impl Lease {
    pub fn pending(
        proposal_id: impl Into<String>,
        product_ref: impl Into<String>,
        max_price: impl Into<String>,
        duration: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            proposal_id: proposal_id.into(),
            status: LeaseStatus::Pending,
            created_at: now,
            updated_at: now,
            lease_id: None,
            spender_address: None,
            earner_address: None,
            price: None,
            product_ref: product_ref.into(),
            max_price: max_price.into(),
            duration: duration.into(),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == LeaseStatus::Approved
    }
}
