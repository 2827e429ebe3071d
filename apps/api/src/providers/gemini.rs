//! Gemini provider — the primary analysis backend, reached through the
//! Generative Language API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::providers::{
    outcome_for_status, AnalysisProvider, AttemptOutcome, AttemptTimer, ProviderAttempt,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const MAX_OUTPUT_TOKENS: u32 = 2000;
/// Low temperature keeps the structured 5 C's response format stable.
const TEMPERATURE: f32 = 0.1;

/// Constructor-injected configuration. The base URL override exists so
/// tests can point the client at a local stub server.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl GeminiConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            // No client-level timeout: the per-attempt timeout is applied
            // around each whole attempt by tokio, which aborts the
            // in-flight request when the future is dropped.
            client: Client::builder()
                .build()
                .expect("Failed to build HTTP client"),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }

    /// One full round trip: request, status classification, body read,
    /// text extraction. No internal timeouts — `analyze` bounds the
    /// whole future.
    async fn call(&self, prompt: &str) -> (AttemptOutcome, Option<String>) {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let response = match self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Gemini transport error: {e}");
                return (AttemptOutcome::TransportError, None);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini API returned {status}: {body}");
            return (outcome_for_status(status), None);
        }

        let parsed = match response.json::<GenerateResponse>().await {
            Ok(p) => p,
            Err(e) => {
                warn!("Gemini response body unreadable: {e}");
                return (AttemptOutcome::InvalidResponse, None);
            }
        };

        let text: String = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            warn!("Gemini returned no text candidates");
            return (AttemptOutcome::InvalidResponse, None);
        }

        debug!("Gemini call succeeded ({} chars)", text.len());
        (AttemptOutcome::Success, Some(text))
    }
}

#[async_trait::async_trait]
impl AnalysisProvider for GeminiProvider {
    fn id(&self) -> &str {
        "gemini"
    }

    async fn analyze(&self, prompt: &str, timeout: Duration) -> ProviderAttempt {
        let timer = AttemptTimer::start(self.id());
        // A single timeout spans the entire attempt — request send and
        // body reads together — so no attempt can outlive its budget.
        match tokio::time::timeout(timeout, self.call(prompt)).await {
            Ok((outcome, raw)) => timer.finish(outcome, raw),
            Err(_) => {
                warn!("Gemini attempt exceeded {}ms timeout", timeout.as_millis());
                timer.finish(AttemptOutcome::Timeout, None)
            }
        }
    }
}
