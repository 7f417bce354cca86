use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use gatelog_core::RecordStore;
use serde_json::{Value, json};

use crate::infra::app_state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "message": "RFID Server running",
        "backend": state.store.backend().as_str(),
    }))
}

pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "ok": true,
        "message": "NDGM RFID API - see /api/* endpoints",
    }))
}

pub async fn auth_disabled_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Authentication endpoints are disabled in this build."
        })),
    )
}

pub async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
