//! Classes 1–8: per-term totals and the half-yearly + yearly roll-up.

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::band::SubjectScoreBand;
use super::grade::{grade_of, percentage_of, LetterGrade};
use super::normalize::{any_nonzero, clamped_or_zero, component, normalize, round_half_up};
use super::{round_2_decimals, CalcError};

const UNIT_TEST_MAX: f64 = 10.0;
const NOTE_BOOK_MAX: f64 = 5.0;
const SUB_ENRICHMENT_MAX: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JuniorTerm {
    HalfYearly,
    Yearly,
}

impl JuniorTerm {
    fn unit_test_keys(self) -> (&'static str, &'static str) {
        match self {
            JuniorTerm::HalfYearly => ("ut1", "ut2"),
            JuniorTerm::Yearly => ("ut3", "ut4"),
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            JuniorTerm::HalfYearly => "",
            JuniorTerm::Yearly => "yearly",
        }
    }
}

fn exam_key(band: SubjectScoreBand) -> &'static str {
    match band {
        SubjectScoreBand::JuniorFortyMark => "examMarks40",
        SubjectScoreBand::JuniorThirtyMark => "examMarks30",
        _ => "examMarks",
    }
}

/// Raw components for one junior term. `ut_a`/`ut_b` are UT1/UT2 for the
/// half-yearly term and UT3/UT4 for the yearly term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JuniorTermInput {
    pub ut_a: Option<f64>,
    pub ut_b: Option<f64>,
    pub note_book: Option<f64>,
    pub sub_enrichment: Option<f64>,
    pub exam_marks: Option<f64>,
}

impl JuniorTermInput {
    /// Read the term's components by their stored names. Yearly fields carry
    /// a `yearly` prefix (`yearlynoteBook`, `yearlyexamMarks40`, ...).
    pub fn from_components(term: JuniorTerm, band: SubjectScoreBand, map: &Map<String, Value>) -> Self {
        let (ut_a, ut_b) = term.unit_test_keys();
        let prefix = term.prefix();
        Self {
            ut_a: component(map, ut_a),
            ut_b: component(map, ut_b),
            note_book: component(map, &format!("{prefix}noteBook")),
            sub_enrichment: component(map, &format!("{prefix}subEnrichment")),
            exam_marks: component(map, &format!("{prefix}{}", exam_key(band))),
        }
    }

    /// True if any component is above zero once clamped to its band maximum.
    pub fn has_nonzero_component(&self, band: SubjectScoreBand) -> bool {
        let exam_max = band.junior_exam_max().unwrap_or(0.0);
        any_nonzero(&[
            (self.ut_a, UNIT_TEST_MAX),
            (self.ut_b, UNIT_TEST_MAX),
            (self.note_book, NOTE_BOOK_MAX),
            (self.sub_enrichment, SUB_ENRICHMENT_MAX),
            (self.exam_marks, exam_max),
        ])
    }

    fn best_unit_test(&self) -> f64 {
        let a = normalize(self.ut_a, UNIT_TEST_MAX);
        let b = normalize(self.ut_b, UNIT_TEST_MAX);
        match (a, b) {
            (Some(a), Some(b)) => a.max(b),
            (Some(v), None) | (None, Some(v)) => v,
            (None, None) => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JuniorTermResult {
    pub total_marks: f64,
    pub grade: LetterGrade,
    pub max_marks: f64,
}

fn require_junior(band: SubjectScoreBand) -> Result<f64, CalcError> {
    band.junior_exam_max().ok_or_else(|| {
        CalcError::missing_band("subject band is not a junior band")
            .with_details(json!({ "band": band.key() }))
    })
}

pub fn compute_junior_term(
    band: SubjectScoreBand,
    input: &JuniorTermInput,
) -> Result<JuniorTermResult, CalcError> {
    let exam_max = require_junior(band)?;
    let best_ut = input.best_unit_test();
    let note_book = clamped_or_zero(input.note_book, NOTE_BOOK_MAX);
    let sub_enrichment = clamped_or_zero(input.sub_enrichment, SUB_ENRICHMENT_MAX);
    let exam = clamped_or_zero(input.exam_marks, exam_max);

    let total_marks = match band {
        SubjectScoreBand::JuniorFortyMark => {
            round_half_up(best_ut / 2.0) + round_half_up((note_book + sub_enrichment) / 2.0) + exam
        }
        _ => best_ut + note_book + sub_enrichment + exam,
    };
    let max_marks = band.term_max();

    Ok(JuniorTermResult {
        total_marks,
        grade: grade_of(percentage_of(total_marks, max_marks)),
        max_marks,
    })
}

/// A stored term total together with the band it was computed under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermTotal {
    pub total: f64,
    pub band: SubjectScoreBand,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JuniorAggregate {
    pub grand_total_marks: Option<f64>,
    pub grand_total_grade: Option<LetterGrade>,
    pub overall_percentage: Option<f64>,
    pub total_possible: Option<f64>,
}

/// Combine the term just computed with the half-yearly result on record.
///
/// Half-yearly stands alone. Yearly needs the half-yearly total; without it
/// every field stays `None`. Terms computed under different bands are not
/// summed. Grades come from the exact percentage; only the reported
/// `overallPercentage` is rounded.
pub fn compute_junior_aggregate(
    term: JuniorTerm,
    current: TermTotal,
    half_yearly: Option<TermTotal>,
) -> Result<JuniorAggregate, CalcError> {
    require_junior(current.band)?;
    match term {
        JuniorTerm::HalfYearly => {
            let possible = current.band.term_max();
            let pct = percentage_of(current.total, possible);
            Ok(JuniorAggregate {
                grand_total_marks: Some(current.total),
                grand_total_grade: Some(grade_of(pct)),
                overall_percentage: Some(round_2_decimals(pct)),
                total_possible: Some(possible),
            })
        }
        JuniorTerm::Yearly => {
            let Some(hy) = half_yearly else {
                return Ok(JuniorAggregate::default());
            };
            if hy.band != current.band {
                return Err(CalcError::new(
                    "band_mismatch",
                    "half-yearly and yearly results use different subject bands",
                )
                .with_details(json!({
                    "halfYearlyBand": hy.band.key(),
                    "yearlyBand": current.band.key(),
                })));
            }
            let grand_total = current.total + hy.total;
            let possible = hy.band.term_max() + current.band.term_max();
            let pct = percentage_of(grand_total, possible);
            Ok(JuniorAggregate {
                grand_total_marks: Some(grand_total),
                grand_total_grade: Some(grade_of(pct)),
                overall_percentage: Some(round_2_decimals(pct)),
                total_possible: Some(possible),
            })
        }
    }
}
