use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
///
/// Startup fails fast on a missing model artifact path or when no
/// provider key is configured — the process never starts serving in a
/// state where it cannot score or analyze.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the trained model artifact. Default: /opt/ml/model/model.json
    pub model_path: String,
    /// Primary provider key. Optional, but at least one provider key
    /// must be present.
    pub gemini_api_key: Option<String>,
    /// Secondary provider key.
    pub anthropic_api_key: Option<String>,
    /// Per-provider-call timeout. Default: 30000ms.
    pub attempt_timeout_ms: u64,
    /// Backoff before the single same-provider rate-limit retry.
    /// Default: 500ms.
    pub rate_limit_backoff_ms: u64,
    /// Optional overall deadline per batch request; applicants not yet
    /// started when it expires are reported NOT_ATTEMPTED.
    pub batch_deadline_ms: Option<u64>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let gemini_api_key = optional_env("GEMINI_API_KEY");
        let anthropic_api_key = optional_env("ANTHROPIC_API_KEY");
        if gemini_api_key.is_none() && anthropic_api_key.is_none() {
            bail!(
                "No analysis providers configured: set GEMINI_API_KEY and/or ANTHROPIC_API_KEY"
            );
        }

        Ok(Config {
            model_path: std::env::var("MODEL_PATH")
                .unwrap_or_else(|_| "/opt/ml/model/model.json".to_string()),
            gemini_api_key,
            anthropic_api_key,
            attempt_timeout_ms: parse_env("ATTEMPT_TIMEOUT_MS", 30_000)?,
            rate_limit_backoff_ms: parse_env("RATE_LIMIT_BACKOFF_MS", 500)?,
            batch_deadline_ms: optional_env("BATCH_DEADLINE_MS")
                .map(|v| {
                    v.parse::<u64>()
                        .context("BATCH_DEADLINE_MS must be a number of milliseconds")
                })
                .transpose()?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Treats unset and empty the same — an empty key is not a credential.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<u64>()
            .with_context(|| format!("{key} must be a number of milliseconds")),
        Err(_) => Ok(default),
    }
}
