//! Identifier minting and derivation.
//!
//! Proposal ids and the `leaseId -> proposalId` derivation share one
//! rendering, `lease_prop_%x`: intake mints from a strictly monotonic
//! nanosecond source, the chain echoes that nonce back as the lease id, and
//! the event ingester re-derives the same string. The mapping is externally
//! visible and must stay stable across processes and re-deliveries.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use uuid::Uuid;

static LAST_NANOS: AtomicI64 = AtomicI64::new(0);

/// Mint a proposal identifier from a high-resolution monotonic source.
///
/// Strictly increasing even when two mints land in the same nanosecond, so
/// ids never collide within a process. Rendered through the same byte-hex
/// derivation the ingester uses, so the chain echoing the nonce back as the
/// lease id reproduces this exact string.
pub fn mint_proposal_id() -> String {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let mut candidate;
    loop {
        let last = LAST_NANOS.load(Ordering::SeqCst);
        candidate = if now > last { now } else { last + 1 };
        if LAST_NANOS
            .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            break;
        }
    }
    let bytes = candidate.to_be_bytes();
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    proposal_id_for_lease(&bytes[first_nonzero..])
}

/// Mint an unguessable computation identifier (v4 UUID, 122 random bits).
pub fn mint_computation_id() -> String {
    format!("comp_{}", Uuid::new_v4().simple())
}

/// Derive the proposal identifier a ratified on-chain lease maps to:
/// `"lease_prop_" + lowerHex(leaseId)`. Externally visible and fixed.
pub fn proposal_id_for_lease(lease_id: &[u8]) -> String {
    format!("lease_prop_{}", hex::encode(lease_id))
}
