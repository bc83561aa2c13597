use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::AppState;

/// GET /healthz: liveness plus whether provider-mutating operations can work.
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "environment": state.environment,
            "provider_configured": state.coordinator.provider_configured(),
        })),
    )
}
