//! Policy engine contract.
//!
//! The agent treats policy as a black box that answers allow or deny with a
//! reason. The shipped implementation enforces a minimum price; richer
//! engines plug in behind the same trait.

use bigdecimal::BigDecimal;

use crate::models::ProposalRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny(String),
}

pub trait PolicyEngine: Send + Sync {
    fn evaluate(&self, request: &ProposalRequest) -> PolicyDecision;
}

/// Denies proposals whose `maxPrice` is below a configured minimum.
pub struct MinPricePolicy {
    min_price: BigDecimal,
}

impl MinPricePolicy {
    pub fn new(min_price: BigDecimal) -> Self {
        Self { min_price }
    }
}

impl PolicyEngine for MinPricePolicy {
    fn evaluate(&self, request: &ProposalRequest) -> PolicyDecision {
        match request.max_price_decimal() {
            Ok(price) if price >= self.min_price => PolicyDecision::Allow,
            Ok(price) => PolicyDecision::Deny(format!(
                "maxPrice {} is below the minimum accepted price {}",
                price, self.min_price
            )),
            Err(_) => PolicyDecision::Deny(format!(
                "maxPrice `{}` is not a valid decimal",
                request.max_price
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn policy(min: &str) -> MinPricePolicy {
        MinPricePolicy::new(BigDecimal::from_str(min).unwrap())
    }

    fn request(max_price: &str) -> ProposalRequest {
        ProposalRequest {
            product_ref: "did:pactum:earner:alpha/p1".to_string(),
            max_price: max_price.to_string(),
            duration: "24h".to_string(),
        }
    }

    #[test]
    fn test_price_at_minimum_is_allowed() {
        assert_eq!(
            policy("0.000001").evaluate(&request("0.000001")),
            PolicyDecision::Allow
        );
    }

    #[test]
    fn test_price_above_minimum_is_allowed() {
        assert_eq!(
            policy("0.000001").evaluate(&request("0.01")),
            PolicyDecision::Allow
        );
    }

    #[test]
    fn test_price_below_minimum_is_denied_with_reason() {
        match policy("0.000001").evaluate(&request("0.0000001")) {
            PolicyDecision::Deny(reason) => {
                assert!(reason.contains("minimum accepted price"));
                assert!(reason.contains("0.000001"));
            }
            PolicyDecision::Allow => panic!("expected denial"),
        }
    }

    #[test]
    fn test_unparseable_price_is_denied() {
        assert!(matches!(
            policy("0.000001").evaluate(&request("not-a-price")),
            PolicyDecision::Deny(_)
        ));
    }
}
