//! Score Model — loads the trained regression artifact and predicts
//! credit scores for applicants.
//!
//! The artifact is a JSON export of the training pipeline: feature
//! columns, one-hot categorical levels, weights, intercept, and a
//! version tag. It is loaded once at process start and immutable
//! thereafter; a missing or malformed artifact fails the process before
//! it accepts any requests.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::scoring::{ApplicantRecord, FeatureValidationError, RiskBand, ScoreResult};

/// Bounds of the credit-score scale the model was trained on.
pub const SCORE_FLOOR: f64 = 300.0;
pub const SCORE_CEILING: f64 = 850.0;

/// On-disk shape of the trained model artifact.
///
/// Weight keys: numeric and boolean features use the bare feature name;
/// one-hot categorical columns use `"Feature=Level"`. A level without a
/// weight contributes zero, matching how the training pipeline aligns
/// unseen columns.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    pub model_version: String,
    pub intercept: f64,
    pub numeric_features: Vec<String>,
    #[serde(default)]
    pub boolean_features: Vec<String>,
    #[serde(default)]
    pub categorical_features: BTreeMap<String, Vec<String>>,
    pub weights: BTreeMap<String, f64>,
}

/// The scorer adapter. `score()` is a pure in-process computation:
/// deterministic for identical input and model version, no network, and
/// never retried.
#[derive(Debug, Clone)]
pub struct ScoreModel {
    artifact: ModelArtifact,
}

impl ScoreModel {
    /// Loads the artifact from disk. Called once at startup; any failure
    /// here is a configuration error and aborts the process.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model artifact at {}", path.display()))?;
        let artifact: ModelArtifact = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse model artifact at {}", path.display()))?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        ensure!(
            !artifact.model_version.is_empty(),
            "model artifact has an empty model_version"
        );
        ensure!(
            !artifact.numeric_features.is_empty()
                || !artifact.boolean_features.is_empty()
                || !artifact.categorical_features.is_empty(),
            "model artifact declares no features"
        );
        info!(
            "Score model loaded: version={}, {} numeric / {} boolean / {} categorical features",
            artifact.model_version,
            artifact.numeric_features.len(),
            artifact.boolean_features.len(),
            artifact.categorical_features.len(),
        );
        Ok(Self { artifact })
    }

    pub fn version(&self) -> &str {
        &self.artifact.model_version
    }

    /// Scores one applicant.
    ///
    /// Every feature the artifact declares must be present with the
    /// right kind; all offending fields are collected into a single
    /// `FeatureValidationError` rather than failing on the first one.
    pub fn score(&self, applicant: &ApplicantRecord) -> Result<ScoreResult, FeatureValidationError> {
        let mut missing: Vec<String> = Vec::new();
        let mut points = self.artifact.intercept;

        for name in &self.artifact.numeric_features {
            match applicant.get(name).and_then(|v| v.as_number()) {
                Some(value) => points += value * self.weight(name),
                None => missing.push(name.clone()),
            }
        }

        for name in &self.artifact.boolean_features {
            match applicant.get(name).and_then(|v| v.as_flag()) {
                Some(true) => points += self.weight(name),
                Some(false) => {}
                None => missing.push(name.clone()),
            }
        }

        for (name, levels) in &self.artifact.categorical_features {
            match applicant.get(name).and_then(|v| v.as_text()) {
                Some(value) => {
                    // An unknown level activates no one-hot column, which
                    // is the training pipeline's reindex behavior.
                    if levels.iter().any(|l| l == value) {
                        points += self.weight(&format!("{name}={value}"));
                    }
                }
                None => missing.push(name.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(FeatureValidationError { fields: missing });
        }

        let credit_score = points.clamp(SCORE_FLOOR, SCORE_CEILING);
        Ok(ScoreResult {
            numeric_score: (credit_score - SCORE_FLOOR) / (SCORE_CEILING - SCORE_FLOOR),
            credit_score: credit_score.round() as i32,
            risk_band: RiskBand::from_points(credit_score),
            model_version: self.artifact.model_version.clone(),
        })
    }

    fn weight(&self, key: &str) -> f64 {
        self.artifact.weights.get(key).copied().unwrap_or(0.0)
    }
}
