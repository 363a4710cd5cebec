//! Score -> grade -> aggregate computation.
//!
//! Everything under `calc` is pure: plain values in, plain values out, no
//! database handle and no clock. Handlers load components from storage, call
//! into here, and write the serialized results back.

pub mod aggregate;
pub mod band;
pub mod grade;
pub mod higher;
pub mod junior;
pub mod normalize;
pub mod record;
pub mod senior;

use serde::Serialize;

pub use aggregate::{
    summarize_student, ReportScope, SessionTerm, StudentResultSummary, SubjectOutcome, TermOutcome,
};
pub use band::{GradingCatalog, SubjectScoreBand, Tier};
pub use grade::LetterGrade;
pub use junior::TermTotal;
pub use record::{compute_record, ComputedRecord};

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn missing_band(message: impl Into<String>) -> Self {
        Self::new("missing_band", message)
    }
}

impl std::fmt::Display for CalcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CalcError {}

/// Two-decimal rounding for report percentages: `78.456 -> 78.46`.
pub fn round_2_decimals(x: f64) -> f64 {
    normalize::round_half_up(x * 100.0) / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_2_decimals_keeps_exact_values() {
        assert_eq!(round_2_decimals(78.5), 78.5);
        assert_eq!(round_2_decimals(91.5), 91.5);
        assert_eq!(round_2_decimals(66.666_666), 66.67);
        assert_eq!(round_2_decimals(0.0), 0.0);
    }

    #[test]
    fn calc_error_display_includes_code() {
        let e = CalcError::missing_band("no band for subject");
        assert_eq!(e.to_string(), "missing_band: no band for subject");
        assert!(e.details.is_none());
    }
}
