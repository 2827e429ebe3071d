//! Prompt Builder — renders the 5 C's evaluation prompt for an
//! applicant and their score.
//!
//! Pure and deterministic: identical input always produces the same
//! prompt, and every provider receives the same one. The numeric score
//! and risk band are embedded so any backend has full context.

use std::fmt::Write as _;

use crate::scoring::{ApplicantRecord, FieldValue, RiskBand, ScoreResult};

/// The five conventional credit-analysis categories, in report order.
pub const FIVE_CS_CATEGORIES: [&str; 5] =
    ["CHARACTER", "CAPACITY", "CAPITAL", "COLLATERAL", "CONDITIONS"];

/// The structured-response contract. Providers must answer in this
/// shape; the parser rejects anything that drifts from it.
const RESPONSE_CONTRACT: &str = "\
You are an expert AI Loan Advisor. Based on the following applicant profile, \
evaluate the 5 C's of credit and make a final loan recommendation.

The response MUST follow this structured style:

CHARACTER X/10
- Repayment History: ...
- Financial Behavior: ...

CAPACITY X/10
- Income-to-Expense Ratio: ...
- Debt-to-Income Post-Loan: ...

CAPITAL X/10
- Savings Rate: ...
- Financial Cushion: ...

COLLATERAL X/10 or N/A
- Type: ...
- Security: ...

CONDITIONS X/10
- Economic Environment: ...
- Employment Status: ...

Overall 5 C's Assessment: [Brief 1-2 line assessment]
Final Risk Assessment: [LOW | MEDIUM | HIGH] RISK
LOAN RECOMMENDATION: [YES | NO]

Evaluate and return the structured response only.";

/// Renders the analysis prompt. Never fails for well-formed input —
/// responsibility for input validity lies with the caller, which has
/// already scored the applicant.
pub fn build_prompt(applicant: &ApplicantRecord, score: &ScoreResult) -> String {
    let mut prompt = String::with_capacity(RESPONSE_CONTRACT.len() + 512);
    prompt.push_str(RESPONSE_CONTRACT);
    prompt.push_str("\n\nApplicant Profile:\n");

    // ApplicantRecord iterates in sorted order, so the rendered profile
    // is stable across calls.
    for (name, value) in applicant.iter() {
        let _ = writeln!(prompt, "- {}: {}", name, render_value(value));
    }

    let _ = writeln!(
        prompt,
        "- Predicted Credit Score: {} ({:.2} normalized)",
        score.credit_score, score.numeric_score
    );
    let _ = writeln!(prompt, "- Model Risk Band: {}", band_label(score.risk_band));
    let _ = writeln!(prompt, "- Scoring Model Version: {}", score.model_version);

    prompt
}

fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{n}")
            }
        }
        FieldValue::Flag(b) => if *b { "Yes" } else { "No" }.to_string(),
        FieldValue::Text(s) => s.clone(),
    }
}

fn band_label(band: RiskBand) -> &'static str {
    match band {
        RiskBand::Low => "LOW",
        RiskBand::Medium => "MEDIUM",
        RiskBand::High => "HIGH",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (ApplicantRecord, ScoreResult) {
        let mut applicant = ApplicantRecord::new();
        applicant.insert("Age", FieldValue::Number(35.0));
        applicant.insert("Income", FieldValue::Number(85000.0));
        applicant.insert("DTIRatio", FieldValue::Number(0.28));
        applicant.insert("HasMortgage", FieldValue::Flag(true));
        applicant.insert("Education", FieldValue::Text("Bachelors".to_string()));
        let score = ScoreResult {
            numeric_score: 0.82,
            credit_score: 751,
            risk_band: RiskBand::Low,
            model_version: "v3".to_string(),
        };
        (applicant, score)
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let (applicant, score) = fixture();
        assert_eq!(
            build_prompt(&applicant, &score),
            build_prompt(&applicant, &score)
        );
    }

    #[test]
    fn test_prompt_embeds_score_and_band() {
        let (applicant, score) = fixture();
        let prompt = build_prompt(&applicant, &score);
        assert!(prompt.contains("Predicted Credit Score: 751"));
        assert!(prompt.contains("Model Risk Band: LOW"));
        assert!(prompt.contains("Scoring Model Version: v3"));
    }

    #[test]
    fn test_prompt_lists_every_applicant_field() {
        let (applicant, score) = fixture();
        let prompt = build_prompt(&applicant, &score);
        assert!(prompt.contains("- Age: 35"));
        assert!(prompt.contains("- Income: 85000"));
        assert!(prompt.contains("- DTIRatio: 0.28"));
        assert!(prompt.contains("- HasMortgage: Yes"));
        assert!(prompt.contains("- Education: Bachelors"));
    }

    #[test]
    fn test_prompt_states_response_contract() {
        let (applicant, score) = fixture();
        let prompt = build_prompt(&applicant, &score);
        for category in FIVE_CS_CATEGORIES {
            assert!(prompt.contains(category), "contract missing {category}");
        }
        assert!(prompt.contains("LOAN RECOMMENDATION: [YES | NO]"));
    }
}
