//! Provider Clients — one per generative backend, behind a uniform
//! `analyze(prompt, timeout)` contract.
//!
//! ARCHITECTURAL RULE: expected runtime failures (timeout, transport
//! error, rate limit, malformed output) are `AttemptOutcome` variants,
//! never errors. The orchestrator makes a uniform fallback decision
//! from the outcome tag without per-provider exception handling.
//! Returning an error (panicking) is reserved for programmer mistakes
//! at construction time.

pub mod anthropic;
pub mod gemini;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;

/// Classification of one provider call. Everything except `Success`
/// drives fallback; none of these surface to the caller as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptOutcome {
    Success,
    Timeout,
    TransportError,
    InvalidResponse,
    RateLimited,
}

/// Record of one provider call. Accumulated in order by the
/// orchestrator and carried into the final result for observability.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAttempt {
    pub provider_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

/// Times one attempt and stamps the resulting record. Every exit path
/// of a provider call goes through `finish`, so duration is always
/// recorded.
pub struct AttemptTimer {
    provider_id: String,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl AttemptTimer {
    pub fn start(provider_id: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    pub fn finish(self, outcome: AttemptOutcome, raw_response: Option<String>) -> ProviderAttempt {
        ProviderAttempt {
            provider_id: self.provider_id,
            started_at: self.started_at,
            duration_ms: self.clock.elapsed().as_millis() as u64,
            outcome,
            raw_response,
        }
    }
}

/// The uniform provider contract. One implementation per backend; each
/// performs a single network round trip per call.
///
/// A call that exceeds `timeout` must abort the underlying request and
/// report `Timeout` — nothing keeps running past the boundary.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn analyze(&self, prompt: &str, timeout: Duration) -> ProviderAttempt;
}

/// Maps an HTTP status from a generative backend to an attempt outcome.
/// 429 is rate limiting; everything else non-2xx is a transport-level
/// failure of that provider.
pub(crate) fn outcome_for_status(status: reqwest::StatusCode) -> AttemptOutcome {
    if status.as_u16() == 429 {
        AttemptOutcome::RateLimited
    } else {
        AttemptOutcome::TransportError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&AttemptOutcome::TransportError).unwrap(),
            r#""TRANSPORT_ERROR""#
        );
        assert_eq!(
            serde_json::to_string(&AttemptOutcome::RateLimited).unwrap(),
            r#""RATE_LIMITED""#
        );
    }

    #[test]
    fn test_timer_stamps_attempt() {
        let timer = AttemptTimer::start("providerA");
        let attempt = timer.finish(AttemptOutcome::Success, Some("ok".to_string()));
        assert_eq!(attempt.provider_id, "providerA");
        assert_eq!(attempt.outcome, AttemptOutcome::Success);
        assert_eq!(attempt.raw_response.as_deref(), Some("ok"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            outcome_for_status(reqwest::StatusCode::TOO_MANY_REQUESTS),
            AttemptOutcome::RateLimited
        );
        assert_eq!(
            outcome_for_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR),
            AttemptOutcome::TransportError
        );
        assert_eq!(
            outcome_for_status(reqwest::StatusCode::UNAUTHORIZED),
            AttemptOutcome::TransportError
        );
    }
}
