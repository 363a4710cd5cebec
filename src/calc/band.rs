use serde::{Deserialize, Serialize};
use serde_json::json;

use super::CalcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tier {
    Junior,
    Senior,
    Higher,
}

impl Tier {
    pub fn for_class_level(class_level: i64) -> Option<Tier> {
        match class_level {
            1..=8 => Some(Tier::Junior),
            9..=10 => Some(Tier::Senior),
            11..=12 => Some(Tier::Higher),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<Tier> {
        match s.trim().to_ascii_lowercase().as_str() {
            "junior" => Some(Tier::Junior),
            "senior" => Some(Tier::Senior),
            "higher" => Some(Tier::Higher),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Junior => "junior",
            Tier::Senior => "senior",
            Tier::Higher => "higher",
        }
    }
}

/// Which components apply to a subject and what they are worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectScoreBand {
    JuniorStandard,
    JuniorFortyMark,
    JuniorThirtyMark,
    SeniorStandard,
    SeniorVocational,
    HigherStandard,
    HigherPracticalHeavy,
}

impl SubjectScoreBand {
    pub const ALL: [SubjectScoreBand; 7] = [
        SubjectScoreBand::JuniorStandard,
        SubjectScoreBand::JuniorFortyMark,
        SubjectScoreBand::JuniorThirtyMark,
        SubjectScoreBand::SeniorStandard,
        SubjectScoreBand::SeniorVocational,
        SubjectScoreBand::HigherStandard,
        SubjectScoreBand::HigherPracticalHeavy,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SubjectScoreBand::JuniorStandard => "junior_standard",
            SubjectScoreBand::JuniorFortyMark => "junior_forty_mark",
            SubjectScoreBand::JuniorThirtyMark => "junior_thirty_mark",
            SubjectScoreBand::SeniorStandard => "senior_standard",
            SubjectScoreBand::SeniorVocational => "senior_vocational",
            SubjectScoreBand::HigherStandard => "higher_standard",
            SubjectScoreBand::HigherPracticalHeavy => "higher_practical_heavy",
        }
    }

    pub fn parse(key: &str) -> Result<SubjectScoreBand, CalcError> {
        let k = key.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.key() == k)
            .ok_or_else(|| {
                CalcError::missing_band("unknown subject score band")
                    .with_details(json!({ "band": key }))
            })
    }

    pub fn tier(self) -> Tier {
        match self {
            SubjectScoreBand::JuniorStandard
            | SubjectScoreBand::JuniorFortyMark
            | SubjectScoreBand::JuniorThirtyMark => Tier::Junior,
            SubjectScoreBand::SeniorStandard | SubjectScoreBand::SeniorVocational => Tier::Senior,
            SubjectScoreBand::HigherStandard | SubjectScoreBand::HigherPracticalHeavy => {
                Tier::Higher
            }
        }
    }

    /// Maximum marks for one term under this band.
    pub fn term_max(self) -> f64 {
        match self {
            SubjectScoreBand::JuniorFortyMark | SubjectScoreBand::JuniorThirtyMark => 50.0,
            _ => 100.0,
        }
    }

    /// Exam maximum for junior bands.
    pub fn junior_exam_max(self) -> Option<f64> {
        match self {
            SubjectScoreBand::JuniorStandard => Some(80.0),
            SubjectScoreBand::JuniorFortyMark => Some(40.0),
            SubjectScoreBand::JuniorThirtyMark => Some(30.0),
            _ => None,
        }
    }
}

/// Subject-code flags that decide bands, plus the alternate-language pairs.
///
/// Stored as the `grading` settings section. Codes compare case-insensitively
/// after trimming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradingCatalog {
    pub forty_mark_codes: Vec<String>,
    pub thirty_mark_codes: Vec<String>,
    pub vocational_codes: Vec<String>,
    pub practical_heavy_codes: Vec<String>,
    pub language_pairs: Vec<[String; 2]>,
}

impl Default for GradingCatalog {
    fn default() -> Self {
        let codes = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            forty_mark_codes: codes(&["COMP01", "GK01", "DRAW02"]),
            thirty_mark_codes: codes(&["HIN01", "SAN01", "URD01"]),
            vocational_codes: codes(&["IT001"]),
            practical_heavy_codes: codes(&["PHE01"]),
            language_pairs: vec![["SAN01".to_string(), "URD01".to_string()]],
        }
    }
}

pub fn canonical_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

fn contains_code(list: &[String], code: &str) -> bool {
    list.iter().any(|c| canonical_code(c) == code)
}

impl GradingCatalog {
    /// Resolve the band for a subject once, when it is registered.
    ///
    /// A blank code cannot be resolved and is reported, not defaulted.
    pub fn resolve_band(&self, tier: Tier, subject_code: &str) -> Result<SubjectScoreBand, CalcError> {
        let code = canonical_code(subject_code);
        if code.is_empty() {
            return Err(CalcError::missing_band("subject code is required to resolve a band")
                .with_details(json!({ "tier": tier.as_str() })));
        }
        let band = match tier {
            Tier::Junior => {
                if contains_code(&self.forty_mark_codes, &code) {
                    SubjectScoreBand::JuniorFortyMark
                } else if contains_code(&self.thirty_mark_codes, &code) {
                    SubjectScoreBand::JuniorThirtyMark
                } else {
                    SubjectScoreBand::JuniorStandard
                }
            }
            Tier::Senior => {
                if contains_code(&self.vocational_codes, &code) {
                    SubjectScoreBand::SeniorVocational
                } else {
                    SubjectScoreBand::SeniorStandard
                }
            }
            Tier::Higher => {
                if contains_code(&self.practical_heavy_codes, &code) {
                    SubjectScoreBand::HigherPracticalHeavy
                } else {
                    SubjectScoreBand::HigherStandard
                }
            }
        };
        Ok(band)
    }

    /// Canonicalized language pairs, skipping degenerate entries.
    pub fn language_pairs(&self) -> Vec<(String, String)> {
        self.language_pairs
            .iter()
            .map(|[a, b]| (canonical_code(a), canonical_code(b)))
            .filter(|(a, b)| !a.is_empty() && !b.is_empty() && a != b)
            .collect()
    }
}
