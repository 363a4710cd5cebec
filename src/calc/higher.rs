//! Classes 11–12.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::{json, Map, Value};

use super::band::SubjectScoreBand;
use super::grade::{grade_of, LetterGrade};
use super::normalize::{any_nonzero, clamped_or_zero, component, round_half_up};
use super::CalcError;

#[derive(Debug, Clone, Copy, PartialEq)]
struct HigherMaxima {
    unit_test: f64,
    half_yearly: f64,
    theory: f64,
    practical: f64,
}

impl HigherMaxima {
    fn raw_max(&self) -> f64 {
        2.0 * self.unit_test + self.half_yearly + self.theory + self.practical
    }
}

const STANDARD: HigherMaxima = HigherMaxima {
    unit_test: 10.0,
    half_yearly: 30.0,
    theory: 35.0,
    practical: 15.0,
};

const PRACTICAL_HEAVY: HigherMaxima = HigherMaxima {
    unit_test: 10.0,
    half_yearly: 30.0,
    theory: 30.0,
    practical: 70.0,
};

fn maxima_for(band: SubjectScoreBand) -> Result<HigherMaxima, CalcError> {
    match band {
        SubjectScoreBand::HigherStandard => Ok(STANDARD),
        SubjectScoreBand::HigherPracticalHeavy => Ok(PRACTICAL_HEAVY),
        other => Err(CalcError::missing_band("subject band is not a higher band")
            .with_details(json!({ "band": other.key() }))),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HigherInput {
    pub unit_test1: Option<f64>,
    pub half_yearly: Option<f64>,
    pub unit_test2: Option<f64>,
    pub theory: Option<f64>,
    pub practical: Option<f64>,
}

impl HigherInput {
    /// The practical-heavy band stores its written and practical parts as
    /// `theory30` / `practical70`.
    pub fn from_components(band: SubjectScoreBand, map: &Map<String, Value>) -> Self {
        let (theory_key, practical_key) = match band {
            SubjectScoreBand::HigherPracticalHeavy => ("theory30", "practical70"),
            _ => ("theory", "practical"),
        };
        Self {
            unit_test1: component(map, "unitTest1"),
            half_yearly: component(map, "halfYearly"),
            unit_test2: component(map, "unitTest2"),
            theory: component(map, theory_key),
            practical: component(map, practical_key),
        }
    }

    pub fn has_nonzero_component(&self, band: SubjectScoreBand) -> bool {
        let Ok(m) = maxima_for(band) else {
            return false;
        };
        any_nonzero(&[
            (self.unit_test1, m.unit_test),
            (self.half_yearly, m.half_yearly),
            (self.unit_test2, m.unit_test),
            (self.theory, m.theory),
            (self.practical, m.practical),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HigherResult {
    pub total_without: f64,
    pub grand_total: f64,
    pub percentage: f64,
    pub grade: LetterGrade,
}

impl HigherResult {
    pub fn overall_grade(&self) -> LetterGrade {
        self.grade
    }
}

impl Serialize for HigherResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("HigherResult", 5)?;
        s.serialize_field("totalWithout", &self.total_without)?;
        s.serialize_field("grandTotal", &self.grand_total)?;
        s.serialize_field("percentage", &self.percentage)?;
        s.serialize_field("grade", &self.grade)?;
        s.serialize_field("overallGrade", &self.overall_grade())?;
        s.end()
    }
}

/// `percentage` is `round(grandTotal)`: the total is already out of 100 and
/// report consumers read both fields.
pub fn compute_higher(band: SubjectScoreBand, input: &HigherInput) -> Result<HigherResult, CalcError> {
    let maxima = maxima_for(band)?;
    let scale = 100.0 / maxima.raw_max();

    let written = clamped_or_zero(input.unit_test1, maxima.unit_test)
        + clamped_or_zero(input.half_yearly, maxima.half_yearly)
        + clamped_or_zero(input.unit_test2, maxima.unit_test)
        + clamped_or_zero(input.theory, maxima.theory);
    let practical = clamped_or_zero(input.practical, maxima.practical);

    let total_without = written * scale;
    let grand_total = (written + practical) * scale;
    let percentage = round_half_up(grand_total);

    Ok(HigherResult {
        total_without,
        grand_total,
        percentage,
        grade: grade_of(percentage),
    })
}
