//! Analysis — the generative half of the assessment pipeline.
//!
//! Takes a scored applicant, renders the 5 C's prompt, and drives the
//! provider fallback chain to a structured recommendation (or a
//! score-only degradation when every provider fails).

pub mod batch;
pub mod orchestrator;
pub mod parser;
pub mod prompt;

use crate::scoring::{ApplicantRecord, ScoreResult};

/// Everything the orchestrator needs for one applicant. Constructed
/// once per applicant and immutable from then on; every provider in
/// the chain sees the same rendered prompt.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub applicant: ApplicantRecord,
    pub score: ScoreResult,
    pub rendered_prompt: String,
}

impl AnalysisRequest {
    pub fn new(applicant: ApplicantRecord, score: ScoreResult) -> Self {
        let rendered_prompt = prompt::build_prompt(&applicant, &score);
        Self {
            applicant,
            score,
            rendered_prompt,
        }
    }
}
