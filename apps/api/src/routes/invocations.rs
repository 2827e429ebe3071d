//! POST /invocations — the batch assessment entry point.
//!
//! Accepts a batch of applicants as `application/json` (an array of
//! applicant objects) or `text/csv` (header-less rows in the fixed
//! column order below), runs the pipeline, and returns one result per
//! applicant in input order. Deadline propagation, status mapping, and
//! transport-level retries belong to the caller; this layer never
//! blocks beyond the pipeline's own bounds.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use tracing::info;

use crate::analysis::batch::BatchResult;
use crate::errors::AppError;
use crate::scoring::{ApplicantRecord, FieldValue};
use crate::state::AppState;

/// Column order for header-less CSV payloads, matching the upstream
/// batch-submission format.
const CSV_COLUMNS: [&str; 14] = [
    "Age",
    "Income",
    "MonthsEmployed",
    "DTIRatio",
    "Education",
    "EmploymentType",
    "MaritalStatus",
    "HasMortgage",
    "HasDependents",
    "LoanPurpose",
    "HasCoSigner",
    "Industry",
    "EconomicEnvironment",
    "PersonalCircumstances",
];

pub async fn handle_invocations(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<BatchResult>, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let applicants = if content_type.starts_with("application/json") {
        parse_json_batch(&body)?
    } else if content_type.starts_with("text/csv") {
        parse_csv_batch(&body)?
    } else {
        return Err(AppError::UnsupportedMediaType(format!(
            "{content_type}; use application/json or text/csv"
        )));
    };

    if applicants.is_empty() {
        return Err(AppError::Validation(
            "Received no applicant data".to_string(),
        ));
    }

    info!("Received invocation batch of {} applicants", applicants.len());
    let result = state.runner.run_batch(applicants).await;
    Ok(Json(result))
}

fn parse_json_batch(body: &[u8]) -> Result<Vec<ApplicantRecord>, AppError> {
    serde_json::from_slice::<Vec<ApplicantRecord>>(body).map_err(|e| {
        AppError::Validation(format!("JSON input must be a list of applicant objects: {e}"))
    })
}

fn parse_csv_batch(body: &[u8]) -> Result<Vec<ApplicantRecord>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(body);

    let mut applicants = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| AppError::Validation(format!("CSV row {row} unreadable: {e}")))?;
        if record.len() != CSV_COLUMNS.len() {
            return Err(AppError::Validation(format!(
                "CSV row {row} has {} columns, expected {}",
                record.len(),
                CSV_COLUMNS.len()
            )));
        }
        let mut applicant = ApplicantRecord::new();
        for (name, cell) in CSV_COLUMNS.iter().zip(record.iter()) {
            applicant.insert(*name, coerce_cell(cell));
        }
        applicants.push(applicant);
    }
    Ok(applicants)
}

/// CSV cells are untyped; booleans and numbers are recovered by shape,
/// everything else stays categorical text.
fn coerce_cell(cell: &str) -> FieldValue {
    if cell.eq_ignore_ascii_case("true") {
        FieldValue::Flag(true)
    } else if cell.eq_ignore_ascii_case("false") {
        FieldValue::Flag(false)
    } else if let Ok(n) = cell.parse::<f64>() {
        FieldValue::Number(n)
    } else {
        FieldValue::Text(cell.to_string())
    }
}
