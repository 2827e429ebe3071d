mod analysis;
mod config;
mod errors;
mod providers;
mod routes;
mod scoring;
mod state;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::batch::BatchRunner;
use crate::analysis::orchestrator::{FallbackOrchestrator, OrchestratorConfig};
use crate::config::Config;
use crate::providers::anthropic::AnthropicConfig;
use crate::providers::gemini::GeminiConfig;
use crate::providers::{AnalysisProvider, AnthropicProvider, GeminiProvider};
use crate::routes::build_router;
use crate::scoring::ScoreModel;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Loan Advisor API v{}", env!("CARGO_PKG_VERSION"));

    // Load the trained model artifact; fail fast before serving.
    let scorer = Arc::new(ScoreModel::load(Path::new(&config.model_path))?);

    // Provider chain in priority order: Gemini first, Anthropic as
    // fallback. Config guarantees at least one key is present.
    let mut chain: Vec<Arc<dyn AnalysisProvider>> = Vec::new();
    if let Some(key) = config.gemini_api_key.clone() {
        chain.push(Arc::new(GeminiProvider::new(GeminiConfig::new(key))));
    }
    if let Some(key) = config.anthropic_api_key.clone() {
        chain.push(Arc::new(AnthropicProvider::new(AnthropicConfig::new(key))));
    }
    info!(
        "Analysis provider chain: {:?}",
        chain.iter().map(|p| p.id()).collect::<Vec<_>>()
    );

    let orchestrator = FallbackOrchestrator::new(
        chain,
        OrchestratorConfig {
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
            rate_limit_backoff: Duration::from_millis(config.rate_limit_backoff_ms),
        },
    );

    let runner = Arc::new(BatchRunner::new(
        scorer,
        orchestrator,
        config.batch_deadline_ms.map(Duration::from_millis),
    ));

    let state = AppState { runner };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
