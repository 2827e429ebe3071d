//! Batch Runner — applies the per-applicant pipeline over a whole
//! batch.
//!
//! Applicants are independent: one applicant failing validation or
//! exhausting the provider chain never removes, reorders, or aborts
//! the others. The output always has one entry per input applicant, in
//! input order — callers match results back to records by index.

use std::sync::Arc;

use serde::Serialize;
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

use crate::analysis::orchestrator::FallbackOrchestrator;
use crate::analysis::parser::{RationaleSection, Recommendation};
use crate::analysis::AnalysisRequest;
use crate::providers::ProviderAttempt;
use crate::scoring::{ApplicantRecord, RiskBand, ScoreModel};

/// How far one applicant's entry got through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    /// Scored and analyzed; a recommendation is present.
    Analyzed,
    /// Scored, but every analysis provider failed — the numeric score
    /// is still reported.
    ScoreOnly,
    /// Scoring input was missing or malformed for this applicant.
    Rejected,
    /// The batch deadline expired before this applicant started.
    NotAttempted,
}

/// One applicant's slot in the batch response. A degraded entry is
/// distinguishable by a null recommendation, never by a missing entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    pub applicant_index: usize,
    pub status: EntryStatus,
    pub numeric_score: Option<f64>,
    pub credit_score: Option<i32>,
    pub risk_band: Option<RiskBand>,
    pub recommendation: Option<Recommendation>,
    pub rationale_sections: Vec<RationaleSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub source_provider_id: Option<String>,
    pub attempts: Vec<ProviderAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl BatchEntry {
    fn unscored(applicant_index: usize, status: EntryStatus, failure_reason: Option<String>) -> Self {
        Self {
            applicant_index,
            status,
            numeric_score: None,
            credit_score: None,
            risk_band: None,
            recommendation: None,
            rationale_sections: Vec::new(),
            confidence: None,
            source_provider_id: None,
            attempts: Vec::new(),
            failure_reason,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub results: Vec<BatchEntry>,
}

/// Runs the scorer + analysis pipeline over an ordered batch.
pub struct BatchRunner {
    scorer: Arc<ScoreModel>,
    orchestrator: FallbackOrchestrator,
    /// Caller-level deadline for the whole batch. When it expires,
    /// not-yet-started applicants are marked NOT_ATTEMPTED rather than
    /// silently omitted. None means no overall bound beyond the
    /// per-attempt timeouts.
    deadline: Option<Duration>,
}

impl BatchRunner {
    pub fn new(
        scorer: Arc<ScoreModel>,
        orchestrator: FallbackOrchestrator,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            scorer,
            orchestrator,
            deadline,
        }
    }

    pub fn model_version(&self) -> &str {
        self.scorer.version()
    }

    pub fn provider_ids(&self) -> Vec<String> {
        self.orchestrator.provider_ids()
    }

    /// Processes every applicant in order. Applicants are handled
    /// sequentially; provider attempts within one applicant are already
    /// strictly sequential, and there is no shared mutable state across
    /// applicants to justify added coordination.
    pub async fn run_batch(&self, applicants: Vec<ApplicantRecord>) -> BatchResult {
        let started = Instant::now();
        let total = applicants.len();
        info!("Running batch of {total} applicants");

        let mut results = Vec::with_capacity(total);
        for (index, applicant) in applicants.into_iter().enumerate() {
            if let Some(deadline) = self.deadline {
                if started.elapsed() >= deadline {
                    warn!(
                        "Batch deadline of {}ms expired; marking applicant {index} NOT_ATTEMPTED",
                        deadline.as_millis()
                    );
                    results.push(BatchEntry::unscored(
                        index,
                        EntryStatus::NotAttempted,
                        None,
                    ));
                    continue;
                }
            }
            results.push(self.run_one(index, applicant).await);
        }

        BatchResult { results }
    }

    async fn run_one(&self, index: usize, applicant: ApplicantRecord) -> BatchEntry {
        let score = match self.scorer.score(&applicant) {
            Ok(score) => score,
            Err(e) => {
                warn!("Applicant {index} failed feature validation: {e}");
                return BatchEntry::unscored(index, EntryStatus::Rejected, Some(e.to_string()));
            }
        };

        let request = AnalysisRequest::new(applicant, score);
        let analysis = self.orchestrator.analyze(&request).await;
        let status = if analysis.recommendation.is_some() {
            EntryStatus::Analyzed
        } else {
            EntryStatus::ScoreOnly
        };

        BatchEntry {
            applicant_index: index,
            status,
            numeric_score: Some(request.score.numeric_score),
            credit_score: Some(request.score.credit_score),
            risk_band: Some(request.score.risk_band),
            recommendation: analysis.recommendation,
            rationale_sections: analysis.rationale_sections,
            confidence: analysis.confidence,
            source_provider_id: analysis.source_provider_id,
            attempts: analysis.attempts,
            failure_reason: None,
        }
    }
}
