//! Response Parser / Validator — extracts a structured decision from a
//! provider's raw text output.
//!
//! The parser never guesses. If the recommendation token cannot be
//! located, or any 5 C's category is missing, it rejects the response;
//! the orchestrator records that as a recoverable INVALID_RESPONSE for
//! the provider and falls back. Parsing is a pure function: the same
//! raw text always yields the same structured output.

use serde::Serialize;
use thiserror::Error;

use crate::analysis::prompt::FIVE_CS_CATEGORIES;

/// The final loan decision, normalized to YES/NO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Recommendation {
    #[serde(rename = "YES")]
    Yes,
    #[serde(rename = "NO")]
    No,
}

/// One named rationale block from the analysis, in document order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RationaleSection {
    pub category: String,
    pub text: String,
    /// Per-category rating from the `X/10` header, as a 0.0–1.0
    /// fraction. Absent when the provider wrote `N/A`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Validated fragment of an analysis, before the orchestrator attaches
/// provider identity and attempt history.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnalysis {
    pub recommendation: Recommendation,
    pub sections: Vec<RationaleSection>,
    /// Mean of the per-category ratings, when any were given.
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("no YES/NO recommendation token found")]
    MissingRecommendation,
    #[error("missing rationale section: {0}")]
    MissingSection(String),
}

/// Parses and validates one raw provider response.
pub fn parse_analysis(raw: &str) -> Result<ParsedAnalysis, ParseError> {
    let recommendation = find_recommendation(raw).ok_or(ParseError::MissingRecommendation)?;
    let sections = collect_sections(raw);

    for category in FIVE_CS_CATEGORIES {
        if !sections.iter().any(|s| s.category == category) {
            return Err(ParseError::MissingSection(category.to_string()));
        }
    }

    let ratings: Vec<f64> = sections.iter().filter_map(|s| s.score).collect();
    let confidence = if ratings.is_empty() {
        None
    } else {
        Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
    };

    Ok(ParsedAnalysis {
        recommendation,
        sections,
        confidence,
    })
}

/// Locates the recommendation token. The final decision line sits at
/// the end of the mandated format, so lines are scanned in reverse and
/// the last explicit token wins. Tokens are matched whole, tolerant of
/// case and surrounding punctuation ("[YES]", "**no**", "YES.").
fn find_recommendation(raw: &str) -> Option<Recommendation> {
    for line in raw.lines().rev() {
        let upper = line.to_uppercase();
        let Some(pos) = upper.find("RECOMMENDATION") else {
            continue;
        };
        let tail = &upper[pos + "RECOMMENDATION".len()..];
        for token in tail.split(|c: char| !c.is_ascii_alphanumeric()) {
            match token {
                "YES" => return Some(Recommendation::Yes),
                "NO" => return Some(Recommendation::No),
                _ => {}
            }
        }
    }
    None
}

fn collect_sections(raw: &str) -> Vec<RationaleSection> {
    let mut sections: Vec<RationaleSection> = Vec::new();
    let mut current: Option<RationaleSection> = None;

    for line in raw.lines() {
        let cleaned = clean_line(line);
        let upper = cleaned.to_uppercase();

        if let Some(category) = header_category(&upper) {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            current = Some(RationaleSection {
                category: category.to_string(),
                text: String::new(),
                score: extract_rating(&upper[category.len()..]),
            });
            continue;
        }

        // The summary block ends the per-category sections.
        if upper.starts_with("OVERALL")
            || upper.starts_with("FINAL RISK")
            || upper.contains("RECOMMENDATION")
        {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            continue;
        }

        if let Some(section) = current.as_mut() {
            if !cleaned.is_empty() {
                if !section.text.is_empty() {
                    section.text.push('\n');
                }
                section.text.push_str(&cleaned);
            }
        }
    }

    if let Some(section) = current.take() {
        sections.push(section);
    }
    sections
}

/// Strips markdown emphasis and list decoration so headers like
/// `**Character (8/10)**` or `⭐ CAPACITY 7/10` still match.
fn clean_line(line: &str) -> String {
    line.trim()
        .trim_start_matches(['*', '#', '⭐', '•', ' '])
        .trim_end_matches(['*', ' '])
        .to_string()
}

/// A header is a line starting with a category name as a whole word.
fn header_category(upper: &str) -> Option<&'static str> {
    for category in FIVE_CS_CATEGORIES {
        if let Some(rest) = upper.strip_prefix(category) {
            let boundary = rest.chars().next().map_or(true, |c| !c.is_ascii_alphanumeric());
            if boundary {
                return Some(category);
            }
        }
    }
    None
}

/// Parses an `X/Y` rating out of the header remainder, e.g. `8/10` or
/// `(7 / 10)`. `N/A` (and anything else unparseable) yields None.
fn extract_rating(tail: &str) -> Option<f64> {
    let slash = tail.find('/')?;
    let numerator: f64 = tail[..slash]
        .trim()
        .trim_start_matches(['(', '[', ':', ' '])
        .trim()
        .parse()
        .ok()?;
    let after = tail[slash + 1..].trim_start();
    let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
    let denominator: f64 = digits.parse().ok()?;
    if denominator == 0.0 {
        return None;
    }
    Some(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "\
⭐ The 5 C's of Credit Evaluation

CHARACTER 8/10
- Repayment History: consistent repayments, no defaults on record.
- Financial Behavior: disciplined spending pattern.

CAPACITY 7/10
- Income-to-Expense Ratio: healthy margin after expenses.
- Debt-to-Income Post-Loan: remains under 35%.

CAPITAL 6/10
- Savings Rate: steady monthly savings.
- Financial Cushion: three months of expenses covered.

COLLATERAL N/A
- Type: unsecured facility.
- Security: none pledged.

CONDITIONS 7/10
- Economic Environment: stable sector.
- Employment Status: five years with current employer.

Overall 5 C's Assessment: Sound profile with manageable obligations.
Final Risk Assessment: LOW RISK
LOAN RECOMMENDATION: [YES]";

    #[test]
    fn test_well_formed_response_parses() {
        let parsed = parse_analysis(WELL_FORMED).unwrap();
        assert_eq!(parsed.recommendation, Recommendation::Yes);
        assert_eq!(parsed.sections.len(), 5);
        assert_eq!(parsed.sections[0].category, "CHARACTER");
        assert!(parsed.sections[0].text.contains("Repayment History"));
        assert_eq!(parsed.sections[3].category, "COLLATERAL");
        assert_eq!(parsed.sections[3].score, None);
    }

    #[test]
    fn test_confidence_is_mean_of_ratings() {
        let parsed = parse_analysis(WELL_FORMED).unwrap();
        // (0.8 + 0.7 + 0.6 + 0.7) / 4 with COLLATERAL unrated.
        let expected = (0.8 + 0.7 + 0.6 + 0.7) / 4.0;
        assert!((parsed.confidence.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_parse_is_idempotent() {
        assert_eq!(
            parse_analysis(WELL_FORMED).unwrap(),
            parse_analysis(WELL_FORMED).unwrap()
        );
    }

    #[test]
    fn test_recommendation_tolerates_case_and_punctuation() {
        let raw = WELL_FORMED.replace("LOAN RECOMMENDATION: [YES]", "Loan Recommendation: **no**.");
        let parsed = parse_analysis(&raw).unwrap();
        assert_eq!(parsed.recommendation, Recommendation::No);
    }

    #[test]
    fn test_not_is_not_a_no_token() {
        let raw = WELL_FORMED.replace(
            "LOAN RECOMMENDATION: [YES]",
            "LOAN RECOMMENDATION: NOT PROVIDED",
        );
        assert_eq!(
            parse_analysis(&raw).unwrap_err(),
            ParseError::MissingRecommendation
        );
    }

    #[test]
    fn test_missing_recommendation_rejected() {
        let raw = WELL_FORMED.replace("LOAN RECOMMENDATION: [YES]", "");
        assert_eq!(
            parse_analysis(&raw).unwrap_err(),
            ParseError::MissingRecommendation
        );
    }

    #[test]
    fn test_missing_category_rejected() {
        let raw = WELL_FORMED.replace("CAPITAL 6/10", "SAVINGS 6/10");
        assert_eq!(
            parse_analysis(&raw).unwrap_err(),
            ParseError::MissingSection("CAPITAL".to_string())
        );
    }

    #[test]
    fn test_markdown_headers_still_match() {
        let raw = WELL_FORMED
            .replace("CHARACTER 8/10", "**Character (8/10)**")
            .replace("CAPACITY 7/10", "## CAPACITY 7 / 10");
        let parsed = parse_analysis(&raw).unwrap();
        assert_eq!(parsed.sections[0].category, "CHARACTER");
        assert_eq!(parsed.sections[0].score, Some(0.8));
        assert_eq!(parsed.sections[1].score, Some(0.7));
    }

    #[test]
    fn test_free_text_rejected() {
        let raw = "I'm sorry, I can't evaluate this applicant.";
        assert!(parse_analysis(raw).is_err());
    }

    #[test]
    fn test_rating_extraction() {
        assert_eq!(extract_rating(" 8/10"), Some(0.8));
        assert_eq!(extract_rating(" (7 / 10)"), Some(0.7));
        assert_eq!(extract_rating(" N/A"), None);
        assert_eq!(extract_rating(""), None);
    }
}
