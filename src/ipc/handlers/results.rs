use std::collections::HashMap;

use crate::calc::{compute_record, CalcError, SessionTerm, SubjectScoreBand, TermTotal, Tier};
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{db_conn, optional_i64, optional_str, optional_tier};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, RecordFilter, ScoreRecord};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FailedRecord {
    record_id: String,
    student_id: String,
    subject_code: String,
    session: String,
    term: &'static str,
    code: String,
    message: String,
}

impl FailedRecord {
    fn new(r: &ScoreRecord, e: CalcError) -> Self {
        Self {
            record_id: r.id.clone(),
            student_id: r.key.student_id.clone(),
            subject_code: r.key.subject_code.clone(),
            session: r.key.session.clone(),
            term: r.key.term.as_str(),
            code: e.code,
            message: e.message,
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecalcSummary {
    recalculated: usize,
    failed: Vec<FailedRecord>,
}

type SubjectKey = (String, String, String);

fn subject_key(r: &ScoreRecord) -> SubjectKey {
    (
        r.key.student_id.clone(),
        r.key.subject_code.clone(),
        r.key.session.clone(),
    )
}

/// Re-run every matching record from its stored components.
///
/// Half-yearly records go first so a yearly record combines with the total
/// computed in the same pass. Calculator failures are reported per record and
/// do not stop the run; storage failures abort it.
fn recalculate(
    conn: &Connection,
    tier: Tier,
    filter: &RecordFilter,
) -> Result<RecalcSummary, CalcError> {
    let mut rows = records::list_records(conn, filter)?;
    rows.sort_by_key(|r| match r.key.term {
        SessionTerm::HalfYearly => 0,
        SessionTerm::Yearly => 1,
        SessionTerm::Final => 2,
    });

    let mut bands: HashMap<String, Option<SubjectScoreBand>> = HashMap::new();
    let mut half_yearly: HashMap<SubjectKey, Option<TermTotal>> = HashMap::new();
    let mut summary = RecalcSummary::default();

    for r in &rows {
        let band = match bands.get(&r.key.subject_code) {
            Some(b) => *b,
            None => {
                let b = records::find_subject(conn, &r.key.subject_code, tier)?.map(|s| s.band);
                bands.insert(r.key.subject_code.clone(), b);
                b
            }
        };
        let Some(band) = band else {
            let e = CalcError::missing_band("subject is not registered for this tier");
            if r.key.term == SessionTerm::HalfYearly {
                half_yearly.insert(subject_key(r), None);
            }
            summary.failed.push(FailedRecord::new(r, e));
            continue;
        };

        let hy = match r.key.term {
            SessionTerm::Yearly => match half_yearly.get(&subject_key(r)) {
                Some(v) => *v,
                None => records::half_yearly_total(
                    conn,
                    &r.key.student_id,
                    &r.key.subject_code,
                    &r.key.session,
                )?,
            },
            _ => None,
        };

        match compute_record(band, r.key.term, &r.components, hy) {
            Ok(computed) => {
                if r.key.term == SessionTerm::HalfYearly {
                    half_yearly.insert(
                        subject_key(r),
                        computed.total.map(|total| TermTotal { total, band }),
                    );
                }
                records::write_record(conn, &r.key, band, &r.components, &computed)?;
                summary.recalculated += 1;
            }
            Err(e) => {
                if r.key.term == SessionTerm::HalfYearly {
                    half_yearly.insert(subject_key(r), None);
                }
                summary.failed.push(FailedRecord::new(r, e));
            }
        }
    }
    Ok(summary)
}

fn handle_results_recalculate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let tier = match optional_tier(req, "tier") {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing tier", None),
        Err(e) => return e,
    };
    let session = match optional_str(req, "session") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_level = match optional_i64(req, "classLevel") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Some(level) = class_level {
        if Tier::for_class_level(level) != Some(tier) {
            return err(
                &req.id,
                "bad_params",
                "classLevel is not part of this tier",
                Some(json!({ "classLevel": level, "tier": tier.as_str() })),
            );
        }
    }
    let filter = RecordFilter {
        tier: Some(tier),
        session,
        class_level,
        student_id: None,
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    let summary = match recalculate(&tx, tier, &filter) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(tier = tier.as_str(), code = %e.code, "recalculation aborted");
            return calc_err(&req.id, e);
        }
    };
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    tracing::info!(
        tier = tier.as_str(),
        recalculated = summary.recalculated,
        failed = summary.failed.len(),
        "recalculation finished"
    );
    ok(
        &req.id,
        json!({
            "tier": tier.as_str(),
            "recalculated": summary.recalculated,
            "failed": summary.failed,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.recalculate" => Some(handle_results_recalculate(state, req)),
        _ => None,
    }
}
