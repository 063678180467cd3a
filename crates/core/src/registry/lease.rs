//! Lease registry: concurrent map from proposal id to lease record.
//!
//! All mutation funnels through `update`, which enforces the status lattice,
//! the immutability of the approval set, and monotonic `updated_at`. The
//! lock is never held across I/O; every operation is O(1) map work.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{CoreError, Result};
use crate::models::{Lease, LeaseStatus};

#[derive(Default)]
pub struct LeaseRegistry {
    inner: RwLock<HashMap<String, Lease>>,
}

impl LeaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the lease iff its proposal id is absent; either way, return
    /// the stored record. Idempotent by contract.
    pub fn create_or_get(&self, lease: Lease) -> Lease {
        let mut map = self.inner.write();
        map.entry(lease.proposal_id.clone()).or_insert(lease).clone()
    }

    /// Apply `mutate` to the record atomically.
    ///
    /// The identity fields (`proposal_id`, `created_at`) are pinned, status
    /// changes must follow the lattice, and once a lease is approved its
    /// `(lease_id, spender, earner, price)` set can no longer change.
    /// `updated_at` is refreshed, never moved backwards.
    pub fn update<F>(&self, proposal_id: &str, mutate: F) -> Result<Lease>
    where
        F: FnOnce(&mut Lease),
    {
        let mut map = self.inner.write();
        let lease = map
            .get_mut(proposal_id)
            .ok_or_else(|| CoreError::LeaseUnknown(proposal_id.to_string()))?;

        let prev = lease.clone();
        mutate(lease);

        if !prev.status.can_transition(lease.status) {
            let attempted = lease.status;
            *lease = prev;
            return Err(CoreError::InvalidTransition {
                from: lease.status,
                to: attempted,
            });
        }

        lease.proposal_id = prev.proposal_id.clone();
        lease.created_at = prev.created_at;
        if prev.status == LeaseStatus::Approved {
            lease.lease_id = prev.lease_id.clone();
            lease.spender_address = prev.spender_address.clone();
            lease.earner_address = prev.earner_address.clone();
            lease.price = prev.price.clone();
        }

        let now = Utc::now();
        lease.updated_at = if now > prev.updated_at {
            now
        } else {
            prev.updated_at
        };

        Ok(lease.clone())
    }

    pub fn get(&self, proposal_id: &str) -> Option<Lease> {
        self.inner.read().get(proposal_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
