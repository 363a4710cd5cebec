use std::collections::HashMap;

use crate::calc::{
    summarize_student, CalcError, GradingCatalog, ReportScope, StudentResultSummary,
    SubjectOutcome, TermOutcome, Tier,
};
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{db_conn, optional_i64, optional_str, report_scope, required_str};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, RecordFilter, ScoreRecord, StudentRow, SubjectRow};
use rusqlite::Connection;
use serde_json::json;

/// Group a student's records into per-subject outcomes, in subject order.
///
/// The subject's current band is what the report expects; each term keeps the
/// band it was computed under so stale results show up as mismatches.
fn subject_outcomes(subjects: &[SubjectRow], rows: Vec<ScoreRecord>) -> Vec<SubjectOutcome> {
    let mut by_code: HashMap<String, Vec<ScoreRecord>> = HashMap::new();
    let mut unregistered: Vec<String> = Vec::new();
    for r in rows {
        let code = r.key.subject_code.clone();
        if !subjects.iter().any(|s| s.code == code) && !unregistered.contains(&code) {
            unregistered.push(code.clone());
        }
        by_code.entry(code).or_default().push(r);
    }

    let registered = subjects.iter().map(|s| (s.code.clone(), Some(s)));
    let orphans = unregistered.into_iter().map(|c| (c, None));

    let mut out = Vec::new();
    for (code, subject) in registered.chain(orphans) {
        let Some(terms) = by_code.remove(&code) else {
            continue;
        };
        let Some(band) = subject.map(|s| s.band).or_else(|| terms.first().map(|r| r.band)) else {
            continue;
        };
        out.push(SubjectOutcome {
            subject_code: code,
            subject_name: subject.map(|s| s.name.clone()),
            band,
            has_nonzero_component: terms.iter().any(|r| r.has_nonzero),
            terms: terms
                .iter()
                .map(|r| TermOutcome {
                    term: r.key.term,
                    band: r.band,
                    total: r.total,
                    grade: r.grade,
                })
                .collect(),
        });
    }
    out
}

fn student_summary(
    conn: &Connection,
    catalog: &GradingCatalog,
    subjects: &[SubjectRow],
    student: &StudentRow,
    tier: Tier,
    session: &str,
    scope: ReportScope,
) -> Result<StudentResultSummary, CalcError> {
    let rows = records::list_records(
        conn,
        &RecordFilter {
            tier: Some(tier),
            session: Some(session.to_string()),
            student_id: Some(student.id.clone()),
            ..RecordFilter::default()
        },
    )?;
    let outcomes = subject_outcomes(subjects, rows);
    Ok(summarize_student(tier, scope, catalog, &outcomes))
}

fn handle_reports_student_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scope = match report_scope(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student = match records::find_student(conn, &student_id) {
        Ok(Some(s)) => s,
        Ok(None) => {
            return err(
                &req.id,
                "not_found",
                "student not found",
                Some(json!({ "studentId": student_id })),
            )
        }
        Err(e) => return calc_err(&req.id, e),
    };
    let Some(tier) = student.tier() else {
        return err(&req.id, "bad_params", "student class level has no tier", None);
    };
    let session = match optional_str(req, "session") {
        Ok(v) => v.unwrap_or_else(|| student.session.clone()),
        Err(e) => return e,
    };
    let catalog = match records::load_catalog(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    let subjects = match records::list_subjects(conn, Some(tier)) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };

    match student_summary(conn, &catalog, &subjects, &student, tier, &session, scope) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "student": student,
                "session": session,
                "summary": summary,
            }),
        ),
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_reports_class_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let session = match required_str(req, "session") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_level = match optional_i64(req, "classLevel") {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing classLevel", None),
        Err(e) => return e,
    };
    let Some(tier) = Tier::for_class_level(class_level) else {
        return err(
            &req.id,
            "bad_params",
            "classLevel must be in 1..=12",
            Some(json!({ "classLevel": class_level })),
        );
    };
    let scope = match report_scope(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let catalog = match records::load_catalog(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    let subjects = match records::list_subjects(conn, Some(tier)) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    let students = match records::list_students(conn, Some(&session), Some(class_level), true) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };

    let mut rows = Vec::with_capacity(students.len());
    for s in &students {
        let summary = match student_summary(conn, &catalog, &subjects, s, tier, &session, scope) {
            Ok(v) => v,
            Err(e) => return calc_err(&req.id, e),
        };
        rows.push(json!({ "student": s, "summary": summary }));
    }

    ok(
        &req.id,
        json!({
            "session": session,
            "classLevel": class_level,
            "tier": tier.as_str(),
            "scope": scope,
            "students": rows,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.studentSummary" => Some(handle_reports_student_summary(state, req)),
        "reports.classSummary" => Some(handle_reports_class_summary(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::{LetterGrade, SessionTerm, SubjectScoreBand};
    use crate::records::RecordKey;
    use serde_json::Map;

    fn subject(code: &str, band: SubjectScoreBand) -> SubjectRow {
        SubjectRow {
            code: code.to_string(),
            tier: band.tier(),
            name: format!("{} name", code),
            band,
            sort_order: 0,
        }
    }

    fn record(code: &str, term: SessionTerm, band: SubjectScoreBand, total: f64, nonzero: bool) -> ScoreRecord {
        ScoreRecord {
            id: format!("{}-{}", code, term.as_str()),
            key: RecordKey {
                student_id: "s1".to_string(),
                subject_code: code.to_string(),
                session: "2024-25".to_string(),
                term,
            },
            tier: band.tier(),
            band,
            components: Map::new(),
            result: None,
            total: Some(total),
            grade: Some(LetterGrade::B1),
            has_nonzero: nonzero,
            computed_at: None,
        }
    }

    #[test]
    fn outcomes_follow_subject_order_and_keep_term_bands() {
        let subjects = vec![
            subject("MATH01", SubjectScoreBand::JuniorStandard),
            subject("COMP01", SubjectScoreBand::JuniorFortyMark),
            subject("ENG01", SubjectScoreBand::JuniorStandard),
        ];
        let rows = vec![
            record("COMP01", SessionTerm::HalfYearly, SubjectScoreBand::JuniorStandard, 40.0, false),
            record("MATH01", SessionTerm::HalfYearly, SubjectScoreBand::JuniorStandard, 70.0, true),
            record("MATH01", SessionTerm::Yearly, SubjectScoreBand::JuniorStandard, 75.0, false),
            record("ART99", SessionTerm::HalfYearly, SubjectScoreBand::JuniorStandard, 60.0, true),
        ];
        let out = subject_outcomes(&subjects, rows);
        let codes: Vec<_> = out.iter().map(|o| o.subject_code.as_str()).collect();
        assert_eq!(codes, vec!["MATH01", "COMP01", "ART99"]);

        assert_eq!(out[0].terms.len(), 2);
        assert!(out[0].has_nonzero_component);
        assert_eq!(out[0].subject_name.as_deref(), Some("MATH01 name"));

        // Stored under the old band; the report compares against the current one.
        assert_eq!(out[1].band, SubjectScoreBand::JuniorFortyMark);
        assert_eq!(out[1].terms[0].band, SubjectScoreBand::JuniorStandard);
        assert!(!out[1].has_nonzero_component);

        assert_eq!(out[2].subject_name, None);
        assert_eq!(out[2].band, SubjectScoreBand::JuniorStandard);
    }
}
