//! Lease proposal endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::{ApiError, Result},
    models::{LeaseStatusResponse, ProposalAccepted, ProposalBody},
    state::AppState,
};

/// Submit a lease proposal
///
/// Validates the request, consults the policy engine, and registers a
/// pending proposal. Ratification is asynchronous; poll the returned id.
pub async fn submit_proposal(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProposalBody>,
) -> Result<impl IntoResponse> {
    if !state.accepting_requests() {
        return Err(ApiError::ShuttingDown);
    }
    debug!(product_id = %body.product_id, "lease proposal received");

    let lease_proposal_id = state.intake.submit(body.into())?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ProposalAccepted { lease_proposal_id }),
    ))
}

/// Poll a lease proposal's current status
pub async fn get_lease(
    State(state): State<Arc<AppState>>,
    Path(proposal_id): Path<String>,
) -> Result<Json<LeaseStatusResponse>> {
    let lease = state
        .leases
        .get(&proposal_id)
        .ok_or_else(|| ApiError::NotFound(format!("lease proposal {}", proposal_id)))?;
    Ok(Json(lease.into()))
}
