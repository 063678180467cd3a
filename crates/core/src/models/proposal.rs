//! Lease proposal requests and their syntactic validation

use std::str::FromStr;
use std::time::Duration;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// An off-chain lease proposal as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRequest {
    /// Data product reference, `did:<namespace>:<who>:<id>/<segment>`.
    pub product_ref: String,
    /// Maximum acceptable price, a non-negative decimal literal.
    pub max_price: String,
    /// Requested lease duration, `<positive integer><d|h|m|s>`.
    pub duration: String,
}

impl ProposalRequest {
    /// Syntactic validation of all three fields. Policy evaluation happens
    /// separately, after this passes.
    pub fn validate(&self) -> Result<()> {
        validate_product_ref(&self.product_ref)?;
        let price = self.max_price_decimal()?;
        if price < BigDecimal::from(0) {
            return Err(CoreError::validation(
                "maxPrice",
                format!("must be non-negative, got {}", self.max_price),
            ));
        }
        parse_duration(&self.duration)?;
        Ok(())
    }

    pub fn max_price_decimal(&self) -> Result<BigDecimal> {
        BigDecimal::from_str(self.max_price.trim()).map_err(|_| {
            CoreError::validation(
                "maxPrice",
                format!("not a decimal literal: `{}`", self.max_price),
            )
        })
    }
}

/// Check the `did:<namespace>:<who>:<id>/<segment>` shape of a product
/// reference. Every segment must be non-empty and the path suffix must be a
/// single element.
pub fn validate_product_ref(value: &str) -> Result<()> {
    let fail = |detail: &str| CoreError::validation("productId", detail);

    let (did, segment) = value
        .split_once('/')
        .ok_or_else(|| fail("expected a `/<segment>` suffix"))?;
    if segment.is_empty() || segment.contains('/') {
        return Err(fail("segment must be a single non-empty path element"));
    }

    let parts: Vec<&str> = did.split(':').collect();
    if parts.len() != 4 || parts[0] != "did" {
        return Err(fail("expected the shape did:<namespace>:<who>:<id>"));
    }
    if parts[1..].iter().any(|p| p.is_empty()) {
        return Err(fail("did segments must be non-empty"));
    }
    Ok(())
}

/// Parse a duration literal of the form `<positive integer><d|h|m|s>`.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let fail = |detail: String| CoreError::ValidationFailed {
        field: "duration".to_string(),
        detail,
    };

    let unit = value
        .chars()
        .last()
        .ok_or_else(|| fail("duration must not be empty".to_string()))?;
    let digits = &value[..value.len() - unit.len_utf8()];
    let count: u64 = digits
        .parse()
        .map_err(|_| fail(format!("expected <number><d|h|m|s>, got `{}`", value)))?;
    if count == 0 {
        return Err(fail("duration must be positive".to_string()));
    }

    let unit_secs = match unit {
        'd' => 86_400,
        'h' => 3_600,
        'm' => 60,
        's' => 1,
        other => return Err(fail(format!("unknown duration unit `{}`", other))),
    };
    count
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| fail(format!("duration out of range: `{}`", value)))
}
