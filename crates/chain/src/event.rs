//! The `LeaseRatified` event and its field-level decoding

use crate::error::{ChainError, Result};

/// On-chain ratification of a lease proposal.
///
/// `lease_id` is the minimal big-endian byte form (no leading zero bytes);
/// `price` is the integer count of the smallest on-chain unit as a decimal
/// string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRatified {
    pub lease_id: Vec<u8>,
    pub spender: String,
    pub earner: String,
    pub price: String,
}

impl LeaseRatified {
    /// The proposal record this event rendezvouses with.
    pub fn proposal_id(&self) -> String {
        pactum_core::ids::proposal_id_for_lease(&self.lease_id)
    }

    /// Lower-hex rendering of the lease id, as stored on the lease record.
    pub fn lease_hex(&self) -> String {
        hex::encode(&self.lease_id)
    }
}

/// Decode a hex lease identifier (`0x` optional, odd nibble counts padded)
/// into its minimal byte form.
pub fn decode_lease_id(raw: &str) -> Result<Vec<u8>> {
    let bare = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    if bare.is_empty() {
        return Err(ChainError::EventMalformed(
            "empty lease identifier".to_string(),
        ));
    }
    let padded = if bare.len() % 2 == 1 {
        format!("0{}", bare)
    } else {
        bare.to_string()
    };
    let bytes = hex::decode(&padded)
        .map_err(|e| ChainError::EventMalformed(format!("lease id `{}`: {}", raw, e)))?;

    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    Ok(bytes[first_nonzero..].to_vec())
}

/// Validate an integer price string (smallest on-chain unit).
pub fn validate_price(raw: &str) -> Result<String> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ChainError::EventMalformed(format!(
            "price `{}` is not a non-negative integer",
            raw
        )));
    }
    Ok(raw.to_string())
}
