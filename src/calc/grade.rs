use serde::{Deserialize, Serialize};

/// The single grading table shared by every calculator and the aggregator.
///
/// Variants are declared best-first, so `A1 < E` under the derived ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
    D,
    E,
}

impl LetterGrade {
    pub fn as_str(self) -> &'static str {
        match self {
            LetterGrade::A1 => "A1",
            LetterGrade::A2 => "A2",
            LetterGrade::B1 => "B1",
            LetterGrade::B2 => "B2",
            LetterGrade::C1 => "C1",
            LetterGrade::C2 => "C2",
            LetterGrade::D => "D",
            LetterGrade::E => "E",
        }
    }

    pub fn parse(s: &str) -> Option<LetterGrade> {
        TABLE
            .iter()
            .copied()
            .chain(std::iter::once(LetterGrade::E))
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Lower bound (inclusive) of the percentage band.
    pub fn lower_bound(self) -> f64 {
        match self {
            LetterGrade::A1 => 91.0,
            LetterGrade::A2 => 81.0,
            LetterGrade::B1 => 71.0,
            LetterGrade::B2 => 61.0,
            LetterGrade::C1 => 51.0,
            LetterGrade::C2 => 41.0,
            LetterGrade::D => 33.0,
            LetterGrade::E => f64::NEG_INFINITY,
        }
    }
}

impl std::fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const TABLE: [LetterGrade; 7] = [
    LetterGrade::A1,
    LetterGrade::A2,
    LetterGrade::B1,
    LetterGrade::B2,
    LetterGrade::C1,
    LetterGrade::C2,
    LetterGrade::D,
];

pub fn grade_of(percentage: f64) -> LetterGrade {
    if percentage.is_nan() {
        return LetterGrade::E;
    }
    TABLE
        .iter()
        .copied()
        .find(|g| percentage >= g.lower_bound())
        .unwrap_or(LetterGrade::E)
}

pub fn percentage_of(total: f64, max: f64) -> f64 {
    if max > 0.0 {
        total / max * 100.0
    } else {
        0.0
    }
}
