//! Fallback Orchestrator — the state machine at the center of the
//! pipeline.
//!
//! Per request: `Trying(0) → Trying(1) → … → {Succeeded, Exhausted}`.
//! Providers are tried strictly in configured order, one at a time;
//! the first validated success wins and no further providers are
//! called. Rate limiting earns at most one same-provider retry after a
//! short backoff. Exhaustion is terminal but non-fatal: the result
//! still carries the full attempt history, and the caller still has
//! the numeric score.
//!
//! Worst-case latency is bounded by
//! (providers × attempt timeout) + one backoff, which keeps this layer
//! safe to sit behind a synchronous request boundary.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::parser::{parse_analysis, RationaleSection, Recommendation};
use crate::analysis::AnalysisRequest;
use crate::providers::{AnalysisProvider, AttemptOutcome, ProviderAttempt};

/// Deployment tunables. Defaults: 30s per attempt, 500ms rate-limit
/// backoff — both overridable from the environment.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub attempt_timeout: Duration,
    pub rate_limit_backoff: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(30),
            rate_limit_backoff: Duration::from_millis(500),
        }
    }
}

/// Terminal artifact of one analysis request.
///
/// When every provider fails, `recommendation` and
/// `source_provider_id` are None and `rationale_sections` is empty,
/// but the attempt history is always complete — the caller degrades to
/// a score-only entry rather than losing the applicant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub recommendation: Option<Recommendation>,
    pub rationale_sections: Vec<RationaleSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub source_provider_id: Option<String>,
    pub attempts: Vec<ProviderAttempt>,
}

impl AnalysisResult {
    fn exhausted(attempts: Vec<ProviderAttempt>) -> Self {
        Self {
            recommendation: None,
            rationale_sections: Vec::new(),
            confidence: None,
            source_provider_id: None,
            attempts,
        }
    }
}

enum ChainState {
    Trying(usize),
    Succeeded(AnalysisResult),
    Exhausted,
}

/// Drives the ordered provider chain for one analysis request.
pub struct FallbackOrchestrator {
    providers: Vec<Arc<dyn AnalysisProvider>>,
    config: OrchestratorConfig,
}

impl FallbackOrchestrator {
    pub fn new(providers: Vec<Arc<dyn AnalysisProvider>>, config: OrchestratorConfig) -> Self {
        Self { providers, config }
    }

    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id().to_string()).collect()
    }

    /// Runs the chain to a terminal state. Never fails: exhaustion is
    /// represented in the result, not raised.
    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        let mut attempts: Vec<ProviderAttempt> = Vec::new();
        let mut state = if self.providers.is_empty() {
            ChainState::Exhausted
        } else {
            ChainState::Trying(0)
        };

        loop {
            state = match state {
                ChainState::Trying(index) => {
                    let provider = &self.providers[index];
                    match self.try_provider(provider.as_ref(), request, &mut attempts).await {
                        Some(fragment) => {
                            info!(
                                "Analysis succeeded via provider '{}' on attempt {}",
                                provider.id(),
                                attempts.len()
                            );
                            ChainState::Succeeded(AnalysisResult {
                                recommendation: Some(fragment.recommendation),
                                rationale_sections: fragment.sections,
                                confidence: fragment.confidence,
                                source_provider_id: Some(provider.id().to_string()),
                                attempts: std::mem::take(&mut attempts),
                            })
                        }
                        None if index + 1 < self.providers.len() => {
                            ChainState::Trying(index + 1)
                        }
                        None => ChainState::Exhausted,
                    }
                }
                ChainState::Succeeded(result) => return result,
                ChainState::Exhausted => {
                    warn!(
                        "All {} analysis providers exhausted after {} attempts",
                        self.providers.len(),
                        attempts.len()
                    );
                    return AnalysisResult::exhausted(attempts);
                }
            };
        }
    }

    /// One provider's turn: a single call, plus at most one retry when
    /// the backend is rate limiting. Returns the validated fragment on
    /// success; None means advance to the next provider.
    async fn try_provider(
        &self,
        provider: &dyn AnalysisProvider,
        request: &AnalysisRequest,
        attempts: &mut Vec<ProviderAttempt>,
    ) -> Option<crate::analysis::parser::ParsedAnalysis> {
        let mut retried_rate_limit = false;

        loop {
            let mut attempt = provider
                .analyze(&request.rendered_prompt, self.config.attempt_timeout)
                .await;

            match attempt.outcome {
                AttemptOutcome::Success => {
                    let raw = attempt.raw_response.as_deref().unwrap_or_default();
                    match parse_analysis(raw) {
                        Ok(fragment) => {
                            attempts.push(attempt);
                            return Some(fragment);
                        }
                        Err(e) => {
                            warn!(
                                "Provider '{}' returned an unparseable analysis: {e}",
                                provider.id()
                            );
                            attempt.outcome = AttemptOutcome::InvalidResponse;
                            attempts.push(attempt);
                            return None;
                        }
                    }
                }
                AttemptOutcome::RateLimited if !retried_rate_limit => {
                    warn!(
                        "Provider '{}' rate limited; retrying once after {}ms",
                        provider.id(),
                        self.config.rate_limit_backoff.as_millis()
                    );
                    attempts.push(attempt);
                    tokio::time::sleep(self.config.rate_limit_backoff).await;
                    retried_rate_limit = true;
                }
                outcome => {
                    warn!(
                        "Provider '{}' attempt failed with {:?}; advancing",
                        provider.id(),
                        outcome
                    );
                    attempts.push(attempt);
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::AttemptTimer;
    use crate::scoring::{ApplicantRecord, FieldValue, RiskBand, ScoreResult};
    use std::sync::Mutex;

    const VALID_ANALYSIS: &str = "\
CHARACTER 8/10
- Repayment History: clean.

CAPACITY 7/10
- Debt-to-Income Post-Loan: acceptable.

CAPITAL 6/10
- Savings Rate: steady.

COLLATERAL N/A
- Security: none pledged.

CONDITIONS 7/10
- Employment Status: stable.

Final Risk Assessment: LOW RISK
LOAN RECOMMENDATION: [YES]";

    /// What the fake provider should do on each successive call.
    #[derive(Clone)]
    enum Step {
        Succeed(&'static str),
        Fail(AttemptOutcome),
    }

    struct ScriptedProvider {
        id: &'static str,
        script: Mutex<Vec<Step>>,
    }

    impl ScriptedProvider {
        fn new(id: &'static str, script: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                id,
                script: Mutex::new(script),
            })
        }
    }

    #[async_trait::async_trait]
    impl AnalysisProvider for ScriptedProvider {
        fn id(&self) -> &str {
            self.id
        }

        async fn analyze(&self, _prompt: &str, _timeout: Duration) -> ProviderAttempt {
            let timer = AttemptTimer::start(self.id);
            let step = {
                let mut script = self.script.lock().unwrap();
                if script.is_empty() {
                    Step::Fail(AttemptOutcome::TransportError)
                } else {
                    script.remove(0)
                }
            };
            match step {
                Step::Succeed(raw) => timer.finish(AttemptOutcome::Success, Some(raw.to_string())),
                Step::Fail(outcome) => timer.finish(outcome, None),
            }
        }
    }

    fn request_fixture() -> AnalysisRequest {
        let mut applicant = ApplicantRecord::new();
        applicant.insert("Age", FieldValue::Number(35.0));
        let score = ScoreResult {
            numeric_score: 0.82,
            credit_score: 751,
            risk_band: RiskBand::Low,
            model_version: "test-1".to_string(),
        };
        AnalysisRequest::new(applicant, score)
    }

    fn orchestrator(providers: Vec<Arc<dyn AnalysisProvider>>) -> FallbackOrchestrator {
        FallbackOrchestrator::new(
            providers,
            OrchestratorConfig {
                attempt_timeout: Duration::from_millis(100),
                rate_limit_backoff: Duration::from_millis(50),
            },
        )
    }

    #[tokio::test]
    async fn test_first_success_wins_with_single_attempt() {
        let a = ScriptedProvider::new("providerA", vec![Step::Succeed(VALID_ANALYSIS)]);
        let b = ScriptedProvider::new("providerB", vec![Step::Succeed(VALID_ANALYSIS)]);
        let orch = orchestrator(vec![a, b]);

        let result = orch.analyze(&request_fixture()).await;
        assert_eq!(result.recommendation, Some(Recommendation::Yes));
        assert_eq!(result.source_provider_id.as_deref(), Some("providerA"));
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.attempts[0].outcome, AttemptOutcome::Success);
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_second_provider() {
        let a = ScriptedProvider::new("providerA", vec![Step::Fail(AttemptOutcome::Timeout)]);
        let b = ScriptedProvider::new("providerB", vec![Step::Succeed(VALID_ANALYSIS)]);
        let orch = orchestrator(vec![a, b]);

        let result = orch.analyze(&request_fixture()).await;
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.attempts[0].outcome, AttemptOutcome::Timeout);
        assert_eq!(result.attempts[0].provider_id, "providerA");
        assert_eq!(result.attempts[1].outcome, AttemptOutcome::Success);
        assert_eq!(result.source_provider_id.as_deref(), Some("providerB"));
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_full_attempt_history() {
        let a = ScriptedProvider::new("providerA", vec![Step::Fail(AttemptOutcome::Timeout)]);
        let b = ScriptedProvider::new(
            "providerB",
            vec![Step::Fail(AttemptOutcome::TransportError)],
        );
        let orch = orchestrator(vec![a, b]);

        let result = orch.analyze(&request_fixture()).await;
        assert_eq!(result.recommendation, None);
        assert!(result.rationale_sections.is_empty());
        assert_eq!(result.source_provider_id, None);
        assert_eq!(result.attempts.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retried_once_then_advances() {
        let a = ScriptedProvider::new(
            "providerA",
            vec![
                Step::Fail(AttemptOutcome::RateLimited),
                Step::Fail(AttemptOutcome::RateLimited),
            ],
        );
        let b = ScriptedProvider::new("providerB", vec![Step::Succeed(VALID_ANALYSIS)]);
        let orch = orchestrator(vec![a, b]);

        let result = orch.analyze(&request_fixture()).await;
        // Two rate-limited attempts against A (one retry, bounded), then B.
        assert_eq!(result.attempts.len(), 3);
        assert_eq!(result.attempts[0].outcome, AttemptOutcome::RateLimited);
        assert_eq!(result.attempts[1].outcome, AttemptOutcome::RateLimited);
        assert_eq!(result.attempts[1].provider_id, "providerA");
        assert_eq!(result.source_provider_id.as_deref(), Some("providerB"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retry_can_succeed() {
        let a = ScriptedProvider::new(
            "providerA",
            vec![
                Step::Fail(AttemptOutcome::RateLimited),
                Step::Succeed(VALID_ANALYSIS),
            ],
        );
        let orch = orchestrator(vec![a]);

        let result = orch.analyze(&request_fixture()).await;
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.source_provider_id.as_deref(), Some("providerA"));
        assert_eq!(result.recommendation, Some(Recommendation::Yes));
    }

    #[tokio::test]
    async fn test_unparseable_success_becomes_invalid_response_and_falls_back() {
        let a = ScriptedProvider::new(
            "providerA",
            vec![Step::Succeed("I cannot evaluate this applicant.")],
        );
        let b = ScriptedProvider::new("providerB", vec![Step::Succeed(VALID_ANALYSIS)]);
        let orch = orchestrator(vec![a, b]);

        let result = orch.analyze(&request_fixture()).await;
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.attempts[0].outcome, AttemptOutcome::InvalidResponse);
        assert_eq!(result.source_provider_id.as_deref(), Some("providerB"));
    }

    #[tokio::test]
    async fn test_empty_chain_is_exhausted() {
        let orch = orchestrator(vec![]);
        let result = orch.analyze(&request_fixture()).await;
        assert_eq!(result.recommendation, None);
        assert!(result.attempts.is_empty());
    }
}
