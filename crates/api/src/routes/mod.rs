//! API routes

pub mod computations;
pub mod health;
pub mod leases;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::state::AppState;

/// Create the main API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // API v1 routes
        .route("/api/v1/leases", post(leases::submit_proposal))
        .route("/api/v1/leases/:proposal_id", get(leases::get_lease))
        .route(
            "/api/v1/computations",
            post(computations::submit_computation),
        )
        .route(
            "/api/v1/computations/:computation_id",
            get(computations::get_computation),
        )
        .with_state(state)
}
