use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use pkg_ratelimit::Operation;
use pkg_types::lease::{CreateLeaseRequest, DeleteLeaseResponse, NodeSelector};
use tracing::info;

use crate::AppState;
use crate::auth::CallerIdentity;
use crate::error::ApiError;

/// GET /api/v1/leases: the caller's active leases, newest first.
pub async fn list_leases(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    state.admit(&caller, Operation::List)?;
    let leases = state.coordinator.list(&caller.user_id).await?;
    Ok((StatusCode::OK, Json(leases)))
}

/// GET /api/v1/leases/{subnet_id}/{node}
pub async fn get_lease(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path((subnet_id, node)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state.admit(&caller, Operation::Get)?;
    let selector = NodeSelector::parse(&node);
    let detail = state
        .coordinator
        .get(&caller.user_id, &subnet_id, &selector)
        .await?;
    Ok((StatusCode::OK, Json(detail)))
}

/// POST /api/v1/leases
pub async fn create_lease(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    payload: Result<Json<CreateLeaseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    state.admit(&caller, Operation::Create)?;
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let created = state.coordinator.create(&caller.user_id, req).await?;
    info!(
        "{} lease {} for user={} ({}/{:?})",
        if created.revived { "Revived" } else { "Created" },
        created.lease.id,
        caller.user_id,
        created.lease.subnet_id,
        created.lease.node_index
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// DELETE /api/v1/leases/{subnet_id}/{node}
pub async fn delete_lease(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path((subnet_id, node)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state.admit(&caller, Operation::Delete)?;
    let selector = NodeSelector::parse(&node);
    let outcome = state
        .coordinator
        .delete(&caller.user_id, &subnet_id, &selector)
        .await?;
    Ok((
        StatusCode::OK,
        Json(DeleteLeaseResponse {
            outcome,
            message: outcome.message().to_string(),
        }),
    ))
}
