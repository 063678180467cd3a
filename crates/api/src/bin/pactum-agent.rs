//! Pactum Agent Binary
//!
//! Main entry point for the data-marketplace agent node: HTTP surface,
//! chain event ingester, and the warm sandbox pool, wired to one
//! process-wide shutdown signal.

use std::process;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use pactum_api::{telemetry, AgentConfig, AppState, Server};
use pactum_chain::{EventIngester, GatewayClient, GatewayEventSource};
use pactum_core::{
    ComputationEngine, JobRegistry, LeaseRegistry, MinPricePolicy, ProposalIntake,
};
use pactum_sandbox::{ProcessSandboxProvider, SandboxPool};

#[tokio::main]
async fn main() {
    // Initialize structured logging (reads RUST_LOG and LOG_FORMAT env vars)
    telemetry::init();

    info!("Starting Pactum agent node");

    // Load configuration
    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };
    let min_price = match config.min_price_decimal() {
        Ok(price) => price,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Registries: the only shared mutable state in the process.
    let leases = Arc::new(LeaseRegistry::new());
    let jobs = Arc::new(JobRegistry::new());

    // Warm sandbox pool; capacity is reached in the background.
    let provider = Arc::new(ProcessSandboxProvider::new());
    let pool = SandboxPool::new(provider, config.pool_capacity);
    pool.start();

    let engine = ComputationEngine::new(
        Arc::clone(&leases),
        Arc::clone(&jobs),
        pool.clone(),
        config.engine(),
    );
    let intake = ProposalIntake::new(
        Arc::clone(&leases),
        Arc::new(MinPricePolicy::new(min_price)),
    );

    // Chain event ingestion
    let gateway = GatewayClient::new(&config.gateway_url, &config.contract_address);
    let source = Arc::new(GatewayEventSource::new(gateway, config.gateway_source()));
    let ingester = EventIngester::new(
        source,
        Arc::clone(&leases),
        config.backoff(),
        shutdown_rx.clone(),
    );
    let mut ingester_task = tokio::spawn(ingester.run());

    // HTTP surface
    let state = Arc::new(AppState::new(
        intake,
        Arc::clone(&leases),
        engine,
        shutdown_rx.clone(),
    ));
    let server = Server::new(config.server(), state);
    let server_task = tokio::spawn(server.start(shutdown_rx));

    // Run until the operator interrupts or the ingester turns fatal.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        result = &mut ingester_task => {
            match result {
                Ok(Ok(())) => info!("Event ingester exited"),
                Ok(Err(e)) => error!("Event ingester failed: {}", e),
                Err(e) => error!("Event ingester task panicked: {}", e),
            }
        }
    }

    if shutdown_tx.send(true).is_err() {
        warn!("All shutdown receivers already dropped");
    }

    // Bounded grace period for running jobs, then tear the pool down;
    // anything still pending stays pending (state is in-memory only).
    let deadline = tokio::time::Instant::now() + Duration::from_secs(config.grace_period_secs);
    while jobs.pending_count() > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    let still_pending = jobs.pending_count();
    if still_pending > 0 {
        warn!(
            pending = still_pending,
            "Grace period expired with jobs still pending"
        );
    }
    pool.stop().await;

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Server error: {}", e),
        Err(e) => error!("Server task panicked: {}", e),
    }

    info!("Pactum agent stopped");
}
