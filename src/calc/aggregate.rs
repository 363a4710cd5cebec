//! Student-level roll-up across all subjects of a session.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::band::{canonical_code, GradingCatalog, SubjectScoreBand, Tier};
use super::grade::{grade_of, percentage_of, LetterGrade};
use super::round_2_decimals;

/// A stored term slot. Junior sessions have two; senior and higher one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionTerm {
    HalfYearly,
    Yearly,
    Final,
}

impl SessionTerm {
    pub fn parse(s: &str) -> Option<SessionTerm> {
        match s.trim() {
            "halfYearly" | "half_yearly" => Some(SessionTerm::HalfYearly),
            "yearly" => Some(SessionTerm::Yearly),
            "final" => Some(SessionTerm::Final),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionTerm::HalfYearly => "halfYearly",
            SessionTerm::Yearly => "yearly",
            SessionTerm::Final => "final",
        }
    }

    pub fn valid_for(self, tier: Tier) -> bool {
        match tier {
            Tier::Junior => matches!(self, SessionTerm::HalfYearly | SessionTerm::Yearly),
            Tier::Senior | Tier::Higher => self == SessionTerm::Final,
        }
    }
}

/// Which report card is being produced. Only junior classes have a separate
/// half-yearly card; senior and higher always count their single term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportScope {
    HalfYearly,
    #[default]
    Annual,
}

impl ReportScope {
    pub fn parse(s: &str) -> Option<ReportScope> {
        match s.trim() {
            "halfYearly" | "half_yearly" => Some(ReportScope::HalfYearly),
            "annual" => Some(ReportScope::Annual),
            _ => None,
        }
    }

    pub fn counted_terms(self, tier: Tier) -> &'static [SessionTerm] {
        match (tier, self) {
            (Tier::Junior, ReportScope::HalfYearly) => &[SessionTerm::HalfYearly],
            (Tier::Junior, ReportScope::Annual) => &[SessionTerm::HalfYearly, SessionTerm::Yearly],
            (Tier::Senior | Tier::Higher, _) => &[SessionTerm::Final],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermOutcome {
    pub term: SessionTerm,
    pub band: SubjectScoreBand,
    pub total: Option<f64>,
    pub grade: Option<LetterGrade>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectOutcome {
    pub subject_code: String,
    pub subject_name: Option<String>,
    pub band: SubjectScoreBand,
    pub terms: Vec<TermOutcome>,
    /// Any component entered as nonzero in any term of the session.
    pub has_nonzero_component: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    LanguageSubstitution,
    IncompleteTerms,
    BandMismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedSubject {
    pub subject_code: String,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectLine {
    pub subject_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    pub band: &'static str,
    pub total_marks: f64,
    pub max_possible_marks: f64,
    pub percentage: f64,
    pub grade: LetterGrade,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResultSummary {
    pub tier: Tier,
    pub scope: ReportScope,
    pub total_marks: f64,
    pub max_possible_marks: f64,
    pub overall_percentage: Option<f64>,
    pub overall_grade: Option<LetterGrade>,
    pub subjects: Vec<SubjectLine>,
    pub excluded_subjects: Vec<ExcludedSubject>,
}

/// Codes to drop because the student only ever took the other language of a
/// mutually exclusive pair. Both-zero and both-nonzero keep both.
fn substituted_codes(catalog: &GradingCatalog, outcomes: &[SubjectOutcome]) -> HashSet<String> {
    let mut dropped = HashSet::new();
    for (a, b) in catalog.language_pairs() {
        let find = |code: &str| {
            outcomes
                .iter()
                .find(|o| canonical_code(&o.subject_code) == code)
        };
        let (Some(sa), Some(sb)) = (find(a.as_str()), find(b.as_str())) else {
            continue;
        };
        match (sa.has_nonzero_component, sb.has_nonzero_component) {
            (true, false) => {
                dropped.insert(b);
            }
            (false, true) => {
                dropped.insert(a);
            }
            _ => {}
        }
    }
    dropped
}

pub fn summarize_student(
    tier: Tier,
    scope: ReportScope,
    catalog: &GradingCatalog,
    outcomes: &[SubjectOutcome],
) -> StudentResultSummary {
    let dropped = substituted_codes(catalog, outcomes);
    let counted = scope.counted_terms(tier);

    let mut subjects = Vec::new();
    let mut excluded = Vec::new();
    let mut total_sum = 0.0_f64;
    let mut max_sum = 0.0_f64;

    for o in outcomes {
        if dropped.contains(&canonical_code(&o.subject_code)) {
            excluded.push(ExcludedSubject {
                subject_code: o.subject_code.clone(),
                reason: ExclusionReason::LanguageSubstitution,
            });
            continue;
        }

        let mut terms = Vec::with_capacity(counted.len());
        for t in counted {
            match o.terms.iter().find(|x| x.term == *t && x.total.is_some()) {
                Some(x) => terms.push(x),
                None => break,
            }
        }
        if terms.len() < counted.len() {
            excluded.push(ExcludedSubject {
                subject_code: o.subject_code.clone(),
                reason: ExclusionReason::IncompleteTerms,
            });
            continue;
        }
        if terms.iter().any(|t| t.band != o.band) {
            excluded.push(ExcludedSubject {
                subject_code: o.subject_code.clone(),
                reason: ExclusionReason::BandMismatch,
            });
            continue;
        }

        let subject_total: f64 = terms.iter().filter_map(|t| t.total).sum();
        let subject_max = o.band.term_max() * counted.len() as f64;
        let percentage = percentage_of(subject_total, subject_max);
        // A single counted term keeps the grade its calculator produced.
        let grade = match terms.as_slice() {
            [only] => only.grade.unwrap_or_else(|| grade_of(percentage)),
            _ => grade_of(percentage),
        };

        total_sum += subject_total;
        max_sum += subject_max;
        subjects.push(SubjectLine {
            subject_code: o.subject_code.clone(),
            subject_name: o.subject_name.clone(),
            band: o.band.key(),
            total_marks: subject_total,
            max_possible_marks: subject_max,
            percentage: round_2_decimals(percentage),
            grade,
        });
    }

    let (overall_percentage, overall_grade) = if max_sum > 0.0 {
        let pct = percentage_of(total_sum, max_sum);
        (Some(round_2_decimals(pct)), Some(grade_of(pct)))
    } else {
        (None, None)
    };

    StudentResultSummary {
        tier,
        scope,
        total_marks: total_sum,
        max_possible_marks: max_sum,
        overall_percentage,
        overall_grade,
        subjects,
        excluded_subjects: excluded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn junior(code: &str, band: SubjectScoreBand, hy: Option<f64>, y: Option<f64>, nonzero: bool) -> SubjectOutcome {
        let mut terms = Vec::new();
        if let Some(t) = hy {
            terms.push(TermOutcome {
                term: SessionTerm::HalfYearly,
                band,
                total: Some(t),
                grade: Some(grade_of(percentage_of(t, band.term_max()))),
            });
        }
        if let Some(t) = y {
            terms.push(TermOutcome {
                term: SessionTerm::Yearly,
                band,
                total: Some(t),
                grade: Some(grade_of(percentage_of(t, band.term_max()))),
            });
        }
        SubjectOutcome {
            subject_code: code.to_string(),
            subject_name: None,
            band,
            terms,
            has_nonzero_component: nonzero,
        }
    }

    fn single(code: &str, band: SubjectScoreBand, total: Option<f64>, grade: Option<LetterGrade>) -> SubjectOutcome {
        SubjectOutcome {
            subject_code: code.to_string(),
            subject_name: None,
            band,
            terms: vec![TermOutcome {
                term: SessionTerm::Final,
                band,
                total,
                grade,
            }],
            has_nonzero_component: total.map(|t| t > 0.0).unwrap_or(false),
        }
    }

    #[test]
    fn junior_annual_mixes_band_maxima() {
        let cat = GradingCatalog::default();
        let outcomes = vec![
            junior("MATH01", SubjectScoreBand::JuniorStandard, Some(88.0), Some(95.0), true),
            junior("COMP01", SubjectScoreBand::JuniorFortyMark, Some(44.0), Some(40.0), true),
        ];
        let s = summarize_student(Tier::Junior, ReportScope::Annual, &cat, &outcomes);
        assert_eq!(s.total_marks, 267.0);
        assert_eq!(s.max_possible_marks, 300.0);
        assert_eq!(s.overall_percentage, Some(89.0));
        assert_eq!(s.overall_grade, Some(LetterGrade::A2));
        assert_eq!(s.subjects.len(), 2);
        assert_eq!(s.subjects[0].percentage, 91.5);
        assert_eq!(s.subjects[0].grade, LetterGrade::A1);
        assert_eq!(s.subjects[1].max_possible_marks, 100.0);
    }

    #[test]
    fn junior_half_yearly_scope_counts_one_term() {
        let cat = GradingCatalog::default();
        let outcomes = vec![junior("MATH01", SubjectScoreBand::JuniorStandard, Some(88.0), None, true)];
        let half = summarize_student(Tier::Junior, ReportScope::HalfYearly, &cat, &outcomes);
        assert_eq!(half.max_possible_marks, 100.0);
        assert_eq!(half.overall_grade, Some(LetterGrade::A2));

        let annual = summarize_student(Tier::Junior, ReportScope::Annual, &cat, &outcomes);
        assert_eq!(annual.subjects.len(), 0);
        assert_eq!(annual.overall_percentage, None);
        assert_eq!(annual.overall_grade, None);
        assert_eq!(annual.excluded_subjects[0].reason, ExclusionReason::IncompleteTerms);
    }

    #[test]
    fn language_substitution_drops_untaken_language() {
        let cat = GradingCatalog::default();
        let outcomes = vec![
            junior("ENG01", SubjectScoreBand::JuniorStandard, Some(70.0), Some(80.0), true),
            junior("SAN01", SubjectScoreBand::JuniorThirtyMark, Some(0.0), Some(0.0), false),
            junior("URD01", SubjectScoreBand::JuniorThirtyMark, Some(40.0), Some(45.0), true),
        ];
        let s = summarize_student(Tier::Junior, ReportScope::Annual, &cat, &outcomes);
        assert_eq!(s.total_marks, 235.0);
        assert_eq!(s.max_possible_marks, 300.0);
        assert_eq!(
            s.excluded_subjects,
            vec![ExcludedSubject {
                subject_code: "SAN01".to_string(),
                reason: ExclusionReason::LanguageSubstitution,
            }]
        );
    }

    #[test]
    fn language_pair_both_zero_keeps_both() {
        let cat = GradingCatalog::default();
        let outcomes = vec![
            junior("SAN01", SubjectScoreBand::JuniorThirtyMark, Some(0.0), Some(0.0), false),
            junior("urd01", SubjectScoreBand::JuniorThirtyMark, Some(0.0), Some(0.0), false),
        ];
        let s = summarize_student(Tier::Junior, ReportScope::Annual, &cat, &outcomes);
        assert!(s.excluded_subjects.is_empty());
        assert_eq!(s.max_possible_marks, 200.0);
        assert_eq!(s.overall_percentage, Some(0.0));
        assert_eq!(s.overall_grade, Some(LetterGrade::E));
    }

    #[test]
    fn language_pair_both_taken_keeps_both() {
        let cat = GradingCatalog::default();
        let outcomes = vec![
            junior("SAN01", SubjectScoreBand::JuniorThirtyMark, Some(30.0), Some(30.0), true),
            junior("URD01", SubjectScoreBand::JuniorThirtyMark, Some(20.0), Some(20.0), true),
        ];
        let s = summarize_student(Tier::Junior, ReportScope::Annual, &cat, &outcomes);
        assert!(s.excluded_subjects.is_empty());
        assert_eq!(s.total_marks, 100.0);
    }

    #[test]
    fn senior_insufficient_subject_is_left_out_of_both_sums() {
        let cat = GradingCatalog::default();
        let outcomes = vec![
            single("MATH09", SubjectScoreBand::SeniorStandard, Some(85.0), Some(LetterGrade::A2)),
            single("SCI09", SubjectScoreBand::SeniorStandard, None, None),
            single("IT001", SubjectScoreBand::SeniorVocational, Some(93.0), Some(LetterGrade::A1)),
        ];
        let s = summarize_student(Tier::Senior, ReportScope::Annual, &cat, &outcomes);
        assert_eq!(s.total_marks, 178.0);
        assert_eq!(s.max_possible_marks, 200.0);
        assert_eq!(s.overall_percentage, Some(89.0));
        assert_eq!(s.overall_grade, Some(LetterGrade::A2));
        assert_eq!(s.excluded_subjects.len(), 1);
        assert_eq!(s.excluded_subjects[0].subject_code, "SCI09");
    }

    #[test]
    fn single_term_subject_keeps_calculator_grade() {
        let cat = GradingCatalog::default();
        // 90.5 rounds to a 91 percentage in the higher calculator.
        let outcomes = vec![single("PHY11", SubjectScoreBand::HigherStandard, Some(90.5), Some(LetterGrade::A1))];
        let s = summarize_student(Tier::Higher, ReportScope::Annual, &cat, &outcomes);
        assert_eq!(s.subjects[0].grade, LetterGrade::A1);
        assert_eq!(s.overall_percentage, Some(90.5));
        assert_eq!(s.overall_grade, Some(LetterGrade::A2));
    }

    #[test]
    fn grades_are_not_lifted_across_a_boundary_by_rounding() {
        let cat = GradingCatalog::default();
        let outcomes = vec![junior("MATH01", SubjectScoreBand::JuniorStandard, Some(90.996), Some(90.996), true)];
        let s = summarize_student(Tier::Junior, ReportScope::Annual, &cat, &outcomes);
        assert_eq!(s.subjects[0].percentage, 91.0);
        assert_eq!(s.subjects[0].grade, LetterGrade::A2);
        assert_eq!(s.overall_percentage, Some(91.0));
        assert_eq!(s.overall_grade, Some(LetterGrade::A2));
    }

    #[test]
    fn band_mismatch_across_terms_is_excluded() {
        let cat = GradingCatalog::default();
        let mut o = junior("GK01", SubjectScoreBand::JuniorFortyMark, Some(40.0), Some(45.0), true);
        o.terms[0].band = SubjectScoreBand::JuniorStandard;
        let s = summarize_student(Tier::Junior, ReportScope::Annual, &cat, &[o]);
        assert_eq!(s.excluded_subjects[0].reason, ExclusionReason::BandMismatch);
        assert_eq!(s.overall_grade, None);
    }

    #[test]
    fn empty_outcomes_do_not_crash() {
        let s = summarize_student(Tier::Higher, ReportScope::Annual, &GradingCatalog::default(), &[]);
        assert_eq!(s.total_marks, 0.0);
        assert_eq!(s.overall_percentage, None);
    }

    #[test]
    fn summary_is_idempotent() {
        let cat = GradingCatalog::default();
        let outcomes = vec![
            junior("MATH01", SubjectScoreBand::JuniorStandard, Some(88.0), Some(95.0), true),
            junior("SAN01", SubjectScoreBand::JuniorThirtyMark, Some(0.0), Some(0.0), false),
            junior("URD01", SubjectScoreBand::JuniorThirtyMark, Some(30.0), Some(35.0), true),
        ];
        let a = summarize_student(Tier::Junior, ReportScope::Annual, &cat, &outcomes);
        let b = summarize_student(Tier::Junior, ReportScope::Annual, &cat, &outcomes);
        assert_eq!(a, b);
    }
}
