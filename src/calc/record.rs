//! Tier dispatch for one stored score record.
//!
//! Both the save path and the recalculation path go through
//! [`compute_record`], so a recalculated record is byte-for-byte what a fresh
//! save of the same components would have written.

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::aggregate::SessionTerm;
use super::band::{SubjectScoreBand, Tier};
use super::grade::LetterGrade;
use super::higher::{compute_higher, HigherInput};
use super::junior::{
    compute_junior_aggregate, compute_junior_term, JuniorAggregate, JuniorTerm, JuniorTermInput,
    JuniorTermResult, TermTotal,
};
use super::senior::{compute_senior, SeniorInput};
use super::CalcError;

#[derive(Debug, Clone, PartialEq)]
pub struct ComputedRecord {
    /// Calculator output under the field names report rendering reads.
    pub result: Value,
    /// Term total used for roll-ups; `None` when data is insufficient.
    pub total: Option<f64>,
    pub grade: Option<LetterGrade>,
    pub has_nonzero: bool,
}

#[derive(Serialize)]
struct JuniorRecordOutput {
    #[serde(flatten)]
    term: JuniorTermResult,
    #[serde(flatten)]
    aggregate: JuniorAggregate,
}

fn to_value<T: Serialize>(v: &T) -> Result<Value, CalcError> {
    serde_json::to_value(v).map_err(|e| CalcError::new("serialize_failed", e.to_string()))
}

fn junior_term(term: SessionTerm) -> Option<JuniorTerm> {
    match term {
        SessionTerm::HalfYearly => Some(JuniorTerm::HalfYearly),
        SessionTerm::Yearly => Some(JuniorTerm::Yearly),
        SessionTerm::Final => None,
    }
}

/// Compute one record from its stored components.
///
/// `half_yearly` is the half-yearly total on record for the same subject and
/// is only consulted for a junior yearly record.
pub fn compute_record(
    band: SubjectScoreBand,
    term: SessionTerm,
    components: &Map<String, Value>,
    half_yearly: Option<TermTotal>,
) -> Result<ComputedRecord, CalcError> {
    let tier = band.tier();
    if !term.valid_for(tier) {
        return Err(CalcError::new("bad_params", "term does not apply to this tier").with_details(
            json!({ "tier": tier.as_str(), "term": term.as_str() }),
        ));
    }

    match tier {
        Tier::Junior => {
            let jt = junior_term(term).ok_or_else(|| CalcError::new("bad_params", "junior term required"))?;
            let input = JuniorTermInput::from_components(jt, band, components);
            let term_result = compute_junior_term(band, &input)?;
            let aggregate = compute_junior_aggregate(
                jt,
                TermTotal {
                    total: term_result.total_marks,
                    band,
                },
                half_yearly,
            )?;
            Ok(ComputedRecord {
                result: to_value(&JuniorRecordOutput {
                    term: term_result,
                    aggregate,
                })?,
                total: Some(term_result.total_marks),
                grade: Some(term_result.grade),
                has_nonzero: input.has_nonzero_component(band),
            })
        }
        Tier::Senior => {
            let input = SeniorInput::from_components(components);
            let r = compute_senior(band, &input)?;
            Ok(ComputedRecord {
                result: to_value(&r)?,
                total: r.grand_total,
                grade: r.grade,
                has_nonzero: input.has_nonzero_component(band),
            })
        }
        Tier::Higher => {
            let input = HigherInput::from_components(band, components);
            let r = compute_higher(band, &input)?;
            Ok(ComputedRecord {
                result: to_value(&r)?,
                total: Some(r.grand_total),
                grade: Some(r.grade),
                has_nonzero: input.has_nonzero_component(band),
            })
        }
    }
}
