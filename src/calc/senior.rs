//! Classes 9–10.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::{json, Map, Value};

use super::band::SubjectScoreBand;
use super::grade::{grade_of, LetterGrade};
use super::normalize::{any_nonzero, clamped_or_zero, component, normalize, round_half_up};
use super::CalcError;

const PERIODIC_TEST_MAX: f64 = 5.0;
const MULTIPLE_ASSESSMENT_MAX: f64 = 5.0;
const PORTFOLIO_MAX: f64 = 5.0;
const SUB_ENRICHMENT_MAX: f64 = 5.0;
const FINAL_EXAM_MAX: f64 = 80.0;
const VOCATIONAL_THEORY_MAX: f64 = 70.0;
const VOCATIONAL_PRACTICAL_MAX: f64 = 30.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeniorInput {
    pub pt1: Option<f64>,
    pub pt2: Option<f64>,
    pub pt3: Option<f64>,
    pub multiple_assessment: Option<f64>,
    pub portfolio: Option<f64>,
    pub sub_enrichment: Option<f64>,
    pub final_exam: Option<f64>,
    pub theory: Option<f64>,
    pub practical: Option<f64>,
}

impl SeniorInput {
    pub fn from_components(map: &Map<String, Value>) -> Self {
        Self {
            pt1: component(map, "pt1"),
            pt2: component(map, "pt2"),
            pt3: component(map, "pt3"),
            multiple_assessment: component(map, "multipleAssessment"),
            portfolio: component(map, "portfolio"),
            sub_enrichment: component(map, "subEnrichment"),
            final_exam: component(map, "finalExam"),
            theory: component(map, "theory"),
            practical: component(map, "practical"),
        }
    }

    /// Only the components the band adds up are considered, clamped first.
    pub fn has_nonzero_component(&self, band: SubjectScoreBand) -> bool {
        match band {
            SubjectScoreBand::SeniorVocational => any_nonzero(&[
                (self.theory, VOCATIONAL_THEORY_MAX),
                (self.practical, VOCATIONAL_PRACTICAL_MAX),
            ]),
            SubjectScoreBand::SeniorStandard => any_nonzero(&[
                (self.pt1, PERIODIC_TEST_MAX),
                (self.pt2, PERIODIC_TEST_MAX),
                (self.pt3, PERIODIC_TEST_MAX),
                (self.multiple_assessment, MULTIPLE_ASSESSMENT_MAX),
                (self.portfolio, PORTFOLIO_MAX),
                (self.sub_enrichment, SUB_ENRICHMENT_MAX),
                (self.final_exam, FINAL_EXAM_MAX),
            ]),
            _ => false,
        }
    }
}

/// Per-subject senior result.
///
/// `overallTotal`, `overallMarks` and `overallGrade` are read by report
/// rendering; they are views over `grand_total` and `grade`, never stored
/// separately.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SeniorResult {
    pub best_two_pt_avg: Option<f64>,
    pub best_score: Option<f64>,
    pub grand_total: Option<f64>,
    pub grade: Option<LetterGrade>,
}

impl SeniorResult {
    pub fn overall_total(&self) -> Option<f64> {
        self.grand_total
    }

    pub fn overall_marks(&self) -> Option<f64> {
        self.grand_total
    }

    pub fn overall_grade(&self) -> Option<LetterGrade> {
        self.grade
    }
}

impl Serialize for SeniorResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("SeniorResult", 7)?;
        s.serialize_field("bestTwoPTAvg", &self.best_two_pt_avg)?;
        s.serialize_field("bestScore", &self.best_score)?;
        s.serialize_field("grandTotal", &self.grand_total)?;
        s.serialize_field("grade", &self.grade)?;
        s.serialize_field("overallTotal", &self.overall_total())?;
        s.serialize_field("overallMarks", &self.overall_marks())?;
        s.serialize_field("overallGrade", &self.overall_grade())?;
        s.end()
    }
}

/// Rounded mean of the two largest periodic tests; `None` with fewer than two.
pub fn best_two_periodic_average(pt1: Option<f64>, pt2: Option<f64>, pt3: Option<f64>) -> Option<f64> {
    let mut present: Vec<f64> = [pt1, pt2, pt3]
        .into_iter()
        .filter_map(|v| normalize(v, PERIODIC_TEST_MAX))
        .collect();
    if present.len() < 2 {
        return None;
    }
    present.sort_by(|a, b| b.total_cmp(a));
    Some(round_half_up((present[0] + present[1]) / 2.0))
}

pub fn compute_senior(band: SubjectScoreBand, input: &SeniorInput) -> Result<SeniorResult, CalcError> {
    match band {
        SubjectScoreBand::SeniorVocational => {
            let total = clamped_or_zero(input.theory, VOCATIONAL_THEORY_MAX)
                + clamped_or_zero(input.practical, VOCATIONAL_PRACTICAL_MAX);
            Ok(SeniorResult {
                best_two_pt_avg: None,
                best_score: None,
                grand_total: Some(total),
                grade: Some(grade_of(total)),
            })
        }
        SubjectScoreBand::SeniorStandard => {
            let Some(avg) = best_two_periodic_average(input.pt1, input.pt2, input.pt3) else {
                return Ok(SeniorResult::default());
            };
            let best_score = avg
                + clamped_or_zero(input.multiple_assessment, MULTIPLE_ASSESSMENT_MAX)
                + clamped_or_zero(input.portfolio, PORTFOLIO_MAX)
                + clamped_or_zero(input.sub_enrichment, SUB_ENRICHMENT_MAX);
            let grand_total = best_score + clamped_or_zero(input.final_exam, FINAL_EXAM_MAX);
            Ok(SeniorResult {
                best_two_pt_avg: Some(avg),
                best_score: Some(best_score),
                grand_total: Some(grand_total),
                grade: Some(grade_of(grand_total)),
            })
        }
        other => Err(CalcError::missing_band("subject band is not a senior band")
            .with_details(json!({ "band": other.key() }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_two_of_three_rounds_half_up() {
        assert_eq!(best_two_periodic_average(Some(3.0), Some(5.0), Some(4.0)), Some(5.0));
        assert_eq!(best_two_periodic_average(Some(3.0), Some(4.0), Some(2.0)), Some(4.0));
        assert_eq!(best_two_periodic_average(Some(1.0), None, Some(2.0)), Some(2.0));
        assert_eq!(best_two_periodic_average(Some(9.0), Some(7.0), None), Some(5.0));
    }

    #[test]
    fn fewer_than_two_periodic_tests_is_insufficient() {
        assert_eq!(best_two_periodic_average(Some(4.0), None, None), None);
        assert_eq!(best_two_periodic_average(None, None, None), None);

        let r = compute_senior(
            SubjectScoreBand::SeniorStandard,
            &SeniorInput {
                pt2: Some(4.0),
                final_exam: Some(70.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(r, SeniorResult::default());
        assert_eq!(r.overall_grade(), None);
    }

    #[test]
    fn standard_formula_adds_best_score_and_final_exam() {
        let r = compute_senior(
            SubjectScoreBand::SeniorStandard,
            &SeniorInput {
                pt1: Some(3.0),
                pt2: Some(5.0),
                pt3: Some(4.0),
                multiple_assessment: Some(4.0),
                portfolio: Some(5.0),
                sub_enrichment: Some(3.0),
                final_exam: Some(68.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(r.best_two_pt_avg, Some(5.0));
        assert_eq!(r.best_score, Some(17.0));
        assert_eq!(r.grand_total, Some(85.0));
        assert_eq!(r.grade, Some(LetterGrade::A2));
        assert_eq!(r.overall_total(), r.grand_total);
        assert_eq!(r.overall_marks(), r.grand_total);
    }

    #[test]
    fn vocational_bypasses_periodic_tests() {
        let r = compute_senior(
            SubjectScoreBand::SeniorVocational,
            &SeniorInput {
                pt1: Some(5.0),
                pt2: Some(5.0),
                pt3: Some(5.0),
                multiple_assessment: Some(5.0),
                theory: Some(65.0),
                practical: Some(28.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(r.grand_total, Some(93.0));
        assert_eq!(r.grade, Some(LetterGrade::A1));
        assert_eq!(r.best_two_pt_avg, None);
        assert_eq!(r.best_score, None);
    }

    #[test]
    fn vocational_clamps_theory_and_practical() {
        let r = compute_senior(
            SubjectScoreBand::SeniorVocational,
            &SeniorInput {
                theory: Some(90.0),
                practical: Some(-4.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(r.grand_total, Some(70.0));
        assert_eq!(r.grade, Some(LetterGrade::B2));
    }

    #[test]
    fn nonzero_detection_follows_the_band() {
        let pts_only = SeniorInput {
            pt1: Some(5.0),
            pt3: Some(2.0),
            ..Default::default()
        };
        assert!(pts_only.has_nonzero_component(SubjectScoreBand::SeniorStandard));
        assert!(!pts_only.has_nonzero_component(SubjectScoreBand::SeniorVocational));

        let negative = SeniorInput {
            theory: Some(-10.0),
            final_exam: Some(-1.0),
            ..Default::default()
        };
        assert!(!negative.has_nonzero_component(SubjectScoreBand::SeniorVocational));
        assert!(!negative.has_nonzero_component(SubjectScoreBand::SeniorStandard));
    }

    #[test]
    fn serialized_aliases_match_grand_total() {
        let r = SeniorResult {
            best_two_pt_avg: Some(4.0),
            best_score: Some(15.0),
            grand_total: Some(72.0),
            grade: Some(LetterGrade::B1),
        };
        let v = serde_json::to_value(r).unwrap();
        assert_eq!(v["bestTwoPTAvg"], json!(4.0));
        assert_eq!(v["grandTotal"], json!(72.0));
        assert_eq!(v["overallTotal"], v["grandTotal"]);
        assert_eq!(v["overallMarks"], v["grandTotal"]);
        assert_eq!(v["overallGrade"], json!("B1"));
        assert_eq!(v["grade"], v["overallGrade"]);
    }

    #[test]
    fn junior_band_is_rejected() {
        let err = compute_senior(SubjectScoreBand::JuniorStandard, &SeniorInput::default()).unwrap_err();
        assert_eq!(err.code, "missing_band");
    }
}
