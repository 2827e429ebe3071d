use std::sync::Arc;

use crate::analysis::batch::BatchRunner;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The assembled scorer + fallback-orchestrator pipeline. Shared
    /// read-only across requests; the runner holds the provider
    /// connection pools.
    pub runner: Arc<BatchRunner>,
}
