//! Computation endpoints

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
    models::{ComputationAccepted, ComputationBody, ComputationStatusResponse},
    state::AppState,
};

/// Submit a computation against an approved lease
///
/// Admission checks run synchronously; the script itself executes in a
/// background task against the sandbox pool. Poll the returned id for the
/// outcome.
pub async fn submit_computation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ComputationBody>,
) -> Result<impl IntoResponse> {
    if !state.accepting_requests() {
        return Err(ApiError::ShuttingDown);
    }
    debug!(lease_id = %body.lease_id, "computation request received");

    let computation_id = state.engine.submit(body.into_request())?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ComputationAccepted { computation_id }),
    ))
}

/// Poll a computation's current snapshot
pub async fn get_computation(
    State(state): State<Arc<AppState>>,
    Path(computation_id): Path<String>,
) -> Result<Json<ComputationStatusResponse>> {
    let job = state
        .engine
        .get_result(&computation_id)
        .ok_or_else(|| ApiError::NotFound(format!("computation {}", computation_id)))?;
    Ok(Json(job.into()))
}
