//! HTTP handlers for the gym API

pub mod api_keys;
pub mod applications;
pub mod exercises;
pub mod permissions;
pub mod routines;

use crate::AppState;
use axum::{extract::State, response::Json};
use serde::Serialize;
use serde_json::{json, Value};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub policy_loaded: bool,
}

/// Liveness check
pub async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let policy_loaded = state.policy.snapshot().await.is_ok();

    Json(HealthResponse {
        status: if policy_loaded { "healthy" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        policy_loaded,
    })
}
