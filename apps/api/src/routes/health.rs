use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "loan-advisor-api"
    }))
}

/// GET /ping
/// Readiness probe. The model artifact and provider chain are loaded
/// before the listener starts, so reaching this handler means the
/// pipeline is serviceable; the body reports what is loaded.
pub async fn ping_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "model_version": state.runner.model_version(),
        "providers": state.runner.provider_ids(),
    }))
}
