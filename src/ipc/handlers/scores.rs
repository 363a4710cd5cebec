use crate::calc::band::canonical_code;
use crate::calc::{compute_record, CalcError, SessionTerm, SubjectScoreBand, TermTotal, Tier};
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{db_conn, optional_bool, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, RecordFilter, RecordKey, StudentRow};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

fn parse_term(req: &Request, tier: Tier) -> Result<SessionTerm, Value> {
    let raw = optional_str(req, "term")?;
    let term = match (raw, tier) {
        (Some(s), _) => SessionTerm::parse(&s).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "term must be one of: halfYearly, yearly, final",
                None,
            )
        })?,
        (None, Tier::Senior | Tier::Higher) => SessionTerm::Final,
        (None, Tier::Junior) => {
            return Err(err(
                &req.id,
                "bad_params",
                "junior scores need term halfYearly or yearly",
                None,
            ))
        }
    };
    if !term.valid_for(tier) {
        return Err(err(
            &req.id,
            "bad_params",
            "term does not apply to this tier",
            Some(json!({ "tier": tier.as_str(), "term": term.as_str() })),
        ));
    }
    Ok(term)
}

/// Apply a components patch. Numbers and strings are stored as entered;
/// `null` clears a component back to absent.
fn merge_components(
    req: &Request,
    current: &mut Map<String, Value>,
    patch: &Map<String, Value>,
) -> Result<(), Value> {
    for (k, v) in patch {
        match v {
            Value::Null => {
                current.remove(k);
            }
            Value::Number(_) | Value::String(_) => {
                current.insert(k.clone(), v.clone());
            }
            _ => {
                return Err(err(
                    &req.id,
                    "bad_params",
                    format!("component {} must be a number, string or null", k),
                    None,
                ))
            }
        }
    }
    Ok(())
}

fn load_student(conn: &Connection, req: &Request) -> Result<(StudentRow, Tier), Value> {
    let student_id = required_str(req, "studentId")?;
    let student = records::find_student(conn, &student_id)
        .map_err(|e| calc_err(&req.id, e))?
        .ok_or_else(|| {
            err(
                &req.id,
                "not_found",
                "student not found",
                Some(json!({ "studentId": student_id })),
            )
        })?;
    let tier = student.tier().ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "student class level has no tier",
            Some(json!({ "classLevel": student.class_level })),
        )
    })?;
    Ok((student, tier))
}

fn registered_band(conn: &Connection, code: &str, tier: Tier) -> Result<SubjectScoreBand, CalcError> {
    records::find_subject(conn, code, tier)?
        .map(|s| s.band)
        .ok_or_else(|| {
            CalcError::missing_band("subject is not registered for this tier")
                .with_details(json!({ "subjectCode": code, "tier": tier.as_str() }))
        })
}

/// Recompute the yearly record against a new half-yearly total, if one exists.
fn refresh_yearly(
    conn: &Connection,
    half_yearly_key: &RecordKey,
    band: SubjectScoreBand,
    half_yearly: Option<TermTotal>,
) -> Result<Option<String>, CalcError> {
    let yearly_key = RecordKey {
        term: SessionTerm::Yearly,
        ..half_yearly_key.clone()
    };
    let Some(yearly) = records::find_record(conn, &yearly_key)? else {
        return Ok(None);
    };
    let computed = compute_record(band, SessionTerm::Yearly, &yearly.components, half_yearly)?;
    records::write_record(conn, &yearly_key, band, &yearly.components, &computed).map(Some)
}

struct SaveOutcome {
    written: Vec<String>,
    /// A roll-up that could not be formed; the components were stored anyway.
    warning: Option<CalcError>,
}

fn save_record(
    conn: &Connection,
    key: &RecordKey,
    band: SubjectScoreBand,
    components: &Map<String, Value>,
) -> Result<SaveOutcome, CalcError> {
    let half_yearly = match key.term {
        SessionTerm::Yearly => {
            records::half_yearly_total(conn, &key.student_id, &key.subject_code, &key.session)?
        }
        _ => None,
    };
    // A half-yearly stored under an older band leaves the yearly unpaired
    // until `results.recalculate` brings both terms onto the current band.
    let (computed, warning) = match compute_record(band, key.term, components, half_yearly) {
        Ok(c) => (c, None),
        Err(e) if e.code == "band_mismatch" => {
            (compute_record(band, key.term, components, None)?, Some(e))
        }
        Err(e) => return Err(e),
    };

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| CalcError::new("db_tx_failed", e.to_string()))?;
    let mut written = vec![records::write_record(&tx, key, band, components, &computed)?];
    if key.term == SessionTerm::HalfYearly {
        let hy = computed.total.map(|total| TermTotal { total, band });
        if let Some(id) = refresh_yearly(&tx, key, band, hy)? {
            written.push(id);
        }
    }
    tx.commit()
        .map_err(|e| CalcError::new("db_commit_failed", e.to_string()))?;
    Ok(SaveOutcome { written, warning })
}

fn handle_scores_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (student, tier) = match load_student(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_code = match required_str(req, "subjectCode") {
        Ok(v) => canonical_code(&v),
        Err(e) => return e,
    };
    let session = match optional_str(req, "session") {
        Ok(v) => v.unwrap_or_else(|| student.session.clone()),
        Err(e) => return e,
    };
    let term = match parse_term(req, tier) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("components").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "components must be an object", None);
    };
    let replace = match optional_bool(req, "replace") {
        Ok(v) => v.unwrap_or(false),
        Err(e) => return e,
    };
    let band = match registered_band(conn, &subject_code, tier) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };

    let key = RecordKey {
        student_id: student.id.clone(),
        subject_code,
        session,
        term,
    };
    let mut components = if replace {
        Map::new()
    } else {
        match records::find_record(conn, &key) {
            Ok(existing) => existing.map(|r| r.components).unwrap_or_default(),
            Err(e) => return calc_err(&req.id, e),
        }
    };
    if let Err(e) = merge_components(req, &mut components, patch) {
        return e;
    }

    let outcome = match save_record(conn, &key, band, &components) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                student_id = %key.student_id,
                subject = %key.subject_code,
                term = key.term.as_str(),
                code = %e.code,
                "score save rejected"
            );
            return calc_err(&req.id, e);
        }
    };
    let record = match records::find_record(conn, &key) {
        Ok(Some(r)) => r,
        Ok(None) => return err(&req.id, "not_found", "record vanished after save", None),
        Err(e) => return calc_err(&req.id, e),
    };
    if let Some(w) = &outcome.warning {
        tracing::warn!(
            student_id = %key.student_id,
            subject = %key.subject_code,
            term = key.term.as_str(),
            code = %w.code,
            "score saved without roll-up"
        );
    }
    tracing::debug!(
        student_id = %key.student_id,
        subject = %key.subject_code,
        term = key.term.as_str(),
        written = outcome.written.len(),
        "score saved"
    );
    ok(
        &req.id,
        json!({
            "record": record.to_json(),
            "updatedRecordIds": outcome.written,
            "warnings": outcome.warning.into_iter().collect::<Vec<_>>(),
        }),
    )
}

fn handle_scores_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (student, tier) = match load_student(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_code = match required_str(req, "subjectCode") {
        Ok(v) => canonical_code(&v),
        Err(e) => return e,
    };
    let session = match optional_str(req, "session") {
        Ok(v) => v.unwrap_or_else(|| student.session.clone()),
        Err(e) => return e,
    };
    let term = match parse_term(req, tier) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let key = RecordKey {
        student_id: student.id,
        subject_code,
        session,
        term,
    };
    match records::find_record(conn, &key) {
        Ok(Some(r)) => ok(&req.id, json!({ "record": r.to_json() })),
        Ok(None) => err(
            &req.id,
            "not_found",
            "no scores recorded",
            Some(json!({
                "studentId": key.student_id,
                "subjectCode": key.subject_code,
                "session": key.session,
                "term": key.term.as_str(),
            })),
        ),
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_scores_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (student, _) = match load_student(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let session = match optional_str(req, "session") {
        Ok(v) => v.unwrap_or_else(|| student.session.clone()),
        Err(e) => return e,
    };
    let filter = RecordFilter {
        session: Some(session),
        student_id: Some(student.id),
        ..RecordFilter::default()
    };
    match records::list_records(conn, &filter) {
        Ok(rows) => ok(
            &req.id,
            json!({ "records": rows.iter().map(|r| r.to_json()).collect::<Vec<_>>() }),
        ),
        Err(e) => calc_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scores.save" => Some(handle_scores_save(state, req)),
        "scores.get" => Some(handle_scores_get(state, req)),
        "scores.list" => Some(handle_scores_list(state, req)),
        _ => None,
    }
}
