//! Anthropic provider — the secondary analysis backend, reached through
//! the Messages API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::providers::{
    outcome_for_status, AnalysisProvider, AttemptOutcome, AttemptTimer, ProviderAttempt,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl AnthropicConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            client: Client::builder()
                .build()
                .expect("Failed to build HTTP client"),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    /// One full round trip: request, status classification, body read,
    /// text extraction. No internal timeouts — `analyze` bounds the
    /// whole future.
    async fn call(&self, prompt: &str) -> (AttemptOutcome, Option<String>) {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = match self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Anthropic transport error: {e}");
                return (AttemptOutcome::TransportError, None);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Anthropic API returned {status}: {body}");
            return (outcome_for_status(status), None);
        }

        let parsed = match response.json::<MessagesResponse>().await {
            Ok(p) => p,
            Err(e) => {
                warn!("Anthropic response body unreadable: {e}");
                return (AttemptOutcome::InvalidResponse, None);
            }
        };

        let text = parsed
            .content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.clone())
            .unwrap_or_default();

        if text.is_empty() {
            warn!("Anthropic returned no text block");
            return (AttemptOutcome::InvalidResponse, None);
        }

        debug!("Anthropic call succeeded ({} chars)", text.len());
        (AttemptOutcome::Success, Some(text))
    }
}

#[async_trait::async_trait]
impl AnalysisProvider for AnthropicProvider {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn analyze(&self, prompt: &str, timeout: Duration) -> ProviderAttempt {
        let timer = AttemptTimer::start(self.id());
        // A single timeout spans the entire attempt — request send and
        // body reads together — so no attempt can outlive its budget.
        match tokio::time::timeout(timeout, self.call(prompt)).await {
            Ok((outcome, raw)) => timer.finish(outcome, raw),
            Err(_) => {
                warn!(
                    "Anthropic attempt exceeded {}ms timeout",
                    timeout.as_millis()
                );
                timer.finish(AttemptOutcome::Timeout, None)
            }
        }
    }
}
