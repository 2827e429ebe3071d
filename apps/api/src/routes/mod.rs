pub mod health;
pub mod invocations;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // SageMaker-style endpoints: health probe plus the batch
        // assessment entry point.
        .route("/ping", get(health::ping_handler))
        .route("/invocations", post(invocations::handle_invocations))
        .with_state(state)
}
