//! Scoring — the statistical half of the assessment pipeline.
//!
//! `ScoreModel` wraps the trained regression artifact and produces a
//! `ScoreResult` per applicant. Scoring is deterministic, in-process, and
//! never retried; the generative analysis layer consumes its output.

pub mod model;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use model::ScoreModel;

/// One applicant field. Input payloads carry a mix of numeric, boolean,
/// and categorical values; the scorer decides which kind each feature
/// must be, based on the model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Boolean features tolerate numeric encoding (0/1), which is how the
    /// CSV ingestion path and some upstream callers send them.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            FieldValue::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One loan applicant: an immutable mapping of named attributes.
///
/// The exact field set is owned by the model artifact (deployment-time
/// configuration), not by this type — the scorer validates presence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicantRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl ApplicantRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Iterates fields in stable (sorted) order, so prompt rendering is
    /// deterministic for identical input.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Coarse categorical grouping derived from the continuous score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    /// Band thresholds on the 300–850 credit-score scale: ≥700 LOW,
    /// ≥600 MEDIUM, else HIGH.
    pub fn from_points(points: f64) -> Self {
        if points >= 700.0 {
            RiskBand::Low
        } else if points >= 600.0 {
            RiskBand::Medium
        } else {
            RiskBand::High
        }
    }
}

/// Output of one scoring pass. Always survives generative-analysis
/// failure: the pipeline degrades to a score-only entry, never drops it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    /// Model prediction normalized to 0.0–1.0.
    pub numeric_score: f64,
    /// The same prediction on the credit-score scale the model was
    /// trained on (clamped to 300–850).
    pub credit_score: i32,
    pub risk_band: RiskBand,
    pub model_version: String,
}

/// Required scoring input is missing or of the wrong kind. Fatal to one
/// applicant, never to the batch. Fields are never silently defaulted —
/// a wrong default would corrupt the score without the caller knowing.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("missing or malformed required features: {}", .fields.join(", "))]
pub struct FeatureValidationError {
    pub fields: Vec<String>,
}
