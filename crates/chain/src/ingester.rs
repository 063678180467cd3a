//! The event ingestion task.
//!
//! A long-lived loop over the states subscribing -> receiving -> backoff:
//! events advance lease records to approved, malformed events are skipped,
//! subscription loss triggers bounded exponential backoff, and the shutdown
//! signal is honored at every suspension point.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use pactum_core::{Lease, LeaseRegistry, LeaseStatus};

use crate::error::{ChainError, Result};
use crate::event::LeaseRatified;
use crate::source::EventSource;

/// Reconnection backoff parameters.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub factor: f64,
    pub max: Duration,
    /// Fractional jitter added on top of the capped delay (0.1 = up to +10%).
    pub jitter: f64,
    /// Consecutive failed attempts before giving up; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(60),
            jitter: 0.1,
            max_attempts: None,
        }
    }
}

impl BackoffConfig {
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let base = self.initial.as_secs_f64() * self.factor.powi(exponent);
        let capped = base.min(self.max.as_secs_f64());
        let jitter = 1.0 + self.jitter * rand::thread_rng().gen::<f64>();
        Duration::from_secs_f64(capped * jitter)
    }
}

pub struct EventIngester {
    source: Arc<dyn EventSource>,
    leases: Arc<LeaseRegistry>,
    backoff: BackoffConfig,
    shutdown: watch::Receiver<bool>,
}

impl EventIngester {
    pub fn new(
        source: Arc<dyn EventSource>,
        leases: Arc<LeaseRegistry>,
        backoff: BackoffConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            leases,
            backoff,
            shutdown,
        }
    }

    /// Run until shutdown (Ok) or until the reconnection budget is exhausted
    /// (`Err(SubscriptionFatal)`, which the process treats as fatal).
    pub async fn run(self) -> Result<()> {
        let mut shutdown = self.shutdown.clone();
        let mut failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                info!("event ingester stopped");
                return Ok(());
            }

            match self.source.subscribe().await {
                Ok(mut stream) => {
                    info!("subscribed to lease ratification events");
                    loop {
                        tokio::select! {
                            changed = shutdown.changed() => {
                                if changed.is_err() || *shutdown.borrow() {
                                    info!("event ingester stopped");
                                    return Ok(());
                                }
                            }
                            item = stream.next() => match item {
                                Some(Ok(event)) => {
                                    failures = 0;
                                    self.handle_event(event);
                                }
                                Some(Err(ChainError::EventMalformed(detail))) => {
                                    warn!(%detail, "skipping malformed lease event");
                                }
                                Some(Err(e)) => {
                                    warn!("event subscription lost: {}", e);
                                    break;
                                }
                                None => {
                                    warn!("event stream ended");
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("event subscription attempt failed: {}", e);
                }
            }

            failures += 1;
            if let Some(max) = self.backoff.max_attempts {
                if failures > max {
                    error!(attempts = failures, "reconnection budget exhausted");
                    return Err(ChainError::SubscriptionFatal { attempts: failures });
                }
            }

            let delay = self.backoff.delay(failures);
            debug!(
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                "backing off before resubscribing"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("event ingester stopped");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Apply one ratification to the lease registry.
    ///
    /// The record is created on the spot when the event wins the race
    /// against proposal intake; the registry's update rules make repeat
    /// deliveries no-ops beyond `updated_at`.
    fn handle_event(&self, event: LeaseRatified) {
        let proposal_id = event.proposal_id();
        let lease_hex = event.lease_hex();
        debug!(
            %proposal_id,
            lease_id = %lease_hex,
            spender = %event.spender,
            "lease ratified on-chain"
        );

        self.leases
            .create_or_get(Lease::pending(proposal_id.clone(), "", "", ""));

        let applied = self.leases.update(&proposal_id, move |lease| {
            lease.status = LeaseStatus::Approved;
            lease.lease_id = Some(lease_hex);
            lease.spender_address = Some(event.spender);
            lease.earner_address = Some(event.earner);
            lease.price = Some(event.price);
        });

        match applied {
            Ok(lease) => info!(
                %proposal_id,
                lease_id = lease.lease_id.as_deref().unwrap_or(""),
                "lease approved"
            ),
            Err(e) => warn!(%proposal_id, "dropping ratification event: {}", e),
        }
    }
}
