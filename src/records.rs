//! Storage port for students, subjects and score records.
//!
//! The calculators never see a connection; handlers go through here to load
//! inputs and write results back.

use rusqlite::{params_from_iter, types::Value as SqlValue, Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::calc::{
    CalcError, ComputedRecord, GradingCatalog, LetterGrade, SessionTerm, SubjectScoreBand, TermTotal,
    Tier,
};
use crate::db;

pub const GRADING_SETTINGS_KEY: &str = "setup.grading";

fn db_err(e: rusqlite::Error) -> CalcError {
    CalcError::new("db_query_failed", e.to_string())
}

fn bad_record(id: &str, message: &str) -> CalcError {
    CalcError::new("bad_record", message.to_string()).with_details(json!({ "recordId": id }))
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn load_catalog(conn: &Connection) -> Result<GradingCatalog, CalcError> {
    let stored = db::settings_get_json(conn, GRADING_SETTINGS_KEY)
        .map_err(|e| CalcError::new("db_query_failed", e.to_string()))?;
    match stored {
        None => Ok(GradingCatalog::default()),
        Some(v) => serde_json::from_value(v)
            .map_err(|e| CalcError::new("bad_settings", format!("grading settings: {}", e))),
    }
}

pub fn store_catalog(conn: &Connection, catalog: &GradingCatalog) -> Result<(), CalcError> {
    let value =
        serde_json::to_value(catalog).map_err(|e| CalcError::new("serialize_failed", e.to_string()))?;
    db::settings_set_json(conn, GRADING_SETTINGS_KEY, &value)
        .map_err(|e| CalcError::new("db_update_failed", e.to_string()))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub id: String,
    pub display_name: String,
    pub class_level: i64,
    pub section: Option<String>,
    pub session: String,
    pub active: bool,
    pub sort_order: i64,
}

impl StudentRow {
    pub fn tier(&self) -> Option<Tier> {
        Tier::for_class_level(self.class_level)
    }
}

const STUDENT_COLUMNS: &str = "id, display_name, class_level, section, session, active, sort_order";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<StudentRow> {
    Ok(StudentRow {
        id: r.get(0)?,
        display_name: r.get(1)?,
        class_level: r.get(2)?,
        section: r.get(3)?,
        session: r.get(4)?,
        active: r.get::<_, i64>(5)? != 0,
        sort_order: r.get(6)?,
    })
}

pub fn find_student(conn: &Connection, id: &str) -> Result<Option<StudentRow>, CalcError> {
    conn.query_row(
        &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?"),
        [id],
        student_from_row,
    )
    .optional()
    .map_err(db_err)
}

pub fn list_students(
    conn: &Connection,
    session: Option<&str>,
    class_level: Option<i64>,
    active_only: bool,
) -> Result<Vec<StudentRow>, CalcError> {
    let mut sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE 1 = 1");
    let mut binds: Vec<SqlValue> = Vec::new();
    if let Some(s) = session {
        sql.push_str(" AND session = ?");
        binds.push(SqlValue::Text(s.to_string()));
    }
    if let Some(level) = class_level {
        sql.push_str(" AND class_level = ?");
        binds.push(SqlValue::Integer(level));
    }
    if active_only {
        sql.push_str(" AND active = 1");
    }
    sql.push_str(" ORDER BY class_level, sort_order, display_name");

    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let rows = stmt
        .query_map(params_from_iter(binds), student_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;
    Ok(rows)
}

pub fn upsert_student(conn: &Connection, student: &StudentRow) -> Result<(), CalcError> {
    conn.execute(
        "INSERT INTO students(id, display_name, class_level, section, session, active, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           display_name = excluded.display_name,
           class_level = excluded.class_level,
           section = excluded.section,
           session = excluded.session,
           active = excluded.active,
           sort_order = excluded.sort_order,
           updated_at = excluded.updated_at",
        (
            &student.id,
            &student.display_name,
            student.class_level,
            &student.section,
            &student.session,
            student.active as i64,
            student.sort_order,
            now_rfc3339(),
        ),
    )
    .map_err(|e| CalcError::new("db_insert_failed", e.to_string()))?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRow {
    pub code: String,
    pub tier: Tier,
    pub name: String,
    pub band: SubjectScoreBand,
    pub sort_order: i64,
}

fn subject_from_parts(
    code: String,
    tier: String,
    name: String,
    band: String,
    sort_order: i64,
) -> Result<SubjectRow, CalcError> {
    let tier = Tier::parse(&tier).ok_or_else(|| {
        CalcError::new("bad_record", "unknown tier on subject").with_details(json!({ "code": code }))
    })?;
    let band = SubjectScoreBand::parse(&band)?;
    Ok(SubjectRow {
        code,
        tier,
        name,
        band,
        sort_order,
    })
}

pub fn find_subject(conn: &Connection, code: &str, tier: Tier) -> Result<Option<SubjectRow>, CalcError> {
    let row: Option<(String, String, String, String, i64)> = conn
        .query_row(
            "SELECT code, tier, name, band, sort_order FROM subjects WHERE code = ? AND tier = ?",
            (code, tier.as_str()),
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
        )
        .optional()
        .map_err(db_err)?;
    row.map(|(c, t, n, b, s)| subject_from_parts(c, t, n, b, s))
        .transpose()
}

pub fn list_subjects(conn: &Connection, tier: Option<Tier>) -> Result<Vec<SubjectRow>, CalcError> {
    let mut sql = "SELECT code, tier, name, band, sort_order FROM subjects".to_string();
    let mut binds: Vec<SqlValue> = Vec::new();
    if let Some(t) = tier {
        sql.push_str(" WHERE tier = ?");
        binds.push(SqlValue::Text(t.as_str().to_string()));
    }
    sql.push_str(" ORDER BY tier, sort_order, code");

    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let raw: Vec<(String, String, String, String, i64)> = stmt
        .query_map(params_from_iter(binds), |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;
    raw.into_iter()
        .map(|(c, t, n, b, s)| subject_from_parts(c, t, n, b, s))
        .collect()
}

pub fn upsert_subject(conn: &Connection, subject: &SubjectRow) -> Result<(), CalcError> {
    conn.execute(
        "INSERT INTO subjects(id, code, tier, name, band, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(code, tier) DO UPDATE SET
           name = excluded.name,
           band = excluded.band,
           sort_order = excluded.sort_order,
           updated_at = excluded.updated_at",
        (
            Uuid::new_v4().to_string(),
            &subject.code,
            subject.tier.as_str(),
            &subject.name,
            subject.band.key(),
            subject.sort_order,
            now_rfc3339(),
        ),
    )
    .map_err(|e| CalcError::new("db_insert_failed", e.to_string()))?;
    Ok(())
}

/// Identifies one logical score record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub student_id: String,
    pub subject_code: String,
    pub session: String,
    pub term: SessionTerm,
}

#[derive(Debug, Clone)]
pub struct ScoreRecord {
    pub id: String,
    pub key: RecordKey,
    pub tier: Tier,
    pub band: SubjectScoreBand,
    pub components: Map<String, Value>,
    pub result: Option<Value>,
    pub total: Option<f64>,
    pub grade: Option<LetterGrade>,
    pub has_nonzero: bool,
    pub computed_at: Option<String>,
}

impl ScoreRecord {
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "studentId": self.key.student_id,
            "subjectCode": self.key.subject_code,
            "session": self.key.session,
            "term": self.key.term.as_str(),
            "tier": self.tier.as_str(),
            "band": self.band.key(),
            "components": self.components,
            "result": self.result,
            "computedAt": self.computed_at,
        })
    }
}

const RECORD_COLUMNS: &str = "id, student_id, subject_code, session, term, tier, band,
     components_json, result_json, total, grade, has_nonzero, computed_at";

struct RawRecord {
    id: String,
    student_id: String,
    subject_code: String,
    session: String,
    term: String,
    tier: String,
    band: String,
    components_json: String,
    result_json: Option<String>,
    total: Option<f64>,
    grade: Option<String>,
    has_nonzero: i64,
    computed_at: Option<String>,
}

fn raw_from_row(r: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject_code: r.get(2)?,
        session: r.get(3)?,
        term: r.get(4)?,
        tier: r.get(5)?,
        band: r.get(6)?,
        components_json: r.get(7)?,
        result_json: r.get(8)?,
        total: r.get(9)?,
        grade: r.get(10)?,
        has_nonzero: r.get(11)?,
        computed_at: r.get(12)?,
    })
}

impl RawRecord {
    fn decode(self) -> Result<ScoreRecord, CalcError> {
        let term = SessionTerm::parse(&self.term).ok_or_else(|| bad_record(&self.id, "unknown term"))?;
        let tier = Tier::parse(&self.tier).ok_or_else(|| bad_record(&self.id, "unknown tier"))?;
        let band = SubjectScoreBand::parse(&self.band)?;
        // Unreadable components degrade to an empty map rather than failing the row.
        let components = serde_json::from_str::<Value>(&self.components_json)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        let result = self
            .result_json
            .as_deref()
            .and_then(|s| serde_json::from_str::<Value>(s).ok());
        let grade = self.grade.as_deref().and_then(LetterGrade::parse);
        Ok(ScoreRecord {
            id: self.id,
            key: RecordKey {
                student_id: self.student_id,
                subject_code: self.subject_code,
                session: self.session,
                term,
            },
            tier,
            band,
            components,
            result,
            total: self.total,
            grade,
            has_nonzero: self.has_nonzero != 0,
            computed_at: self.computed_at,
        })
    }
}

pub fn find_record(conn: &Connection, key: &RecordKey) -> Result<Option<ScoreRecord>, CalcError> {
    let raw = conn
        .query_row(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM score_records
                 WHERE student_id = ? AND subject_code = ? AND session = ? AND term = ?"
            ),
            (
                &key.student_id,
                &key.subject_code,
                &key.session,
                key.term.as_str(),
            ),
            raw_from_row,
        )
        .optional()
        .map_err(db_err)?;
    raw.map(RawRecord::decode).transpose()
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub tier: Option<Tier>,
    pub session: Option<String>,
    pub class_level: Option<i64>,
    pub student_id: Option<String>,
}

pub fn list_records(conn: &Connection, filter: &RecordFilter) -> Result<Vec<ScoreRecord>, CalcError> {
    let cols = RECORD_COLUMNS
        .split(',')
        .map(|c| format!("r.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!(
        "SELECT {cols} FROM score_records r JOIN students s ON s.id = r.student_id WHERE 1 = 1"
    );
    let mut binds: Vec<SqlValue> = Vec::new();
    if let Some(t) = filter.tier {
        sql.push_str(" AND r.tier = ?");
        binds.push(SqlValue::Text(t.as_str().to_string()));
    }
    if let Some(s) = &filter.session {
        sql.push_str(" AND r.session = ?");
        binds.push(SqlValue::Text(s.clone()));
    }
    if let Some(level) = filter.class_level {
        sql.push_str(" AND s.class_level = ?");
        binds.push(SqlValue::Integer(level));
    }
    if let Some(id) = &filter.student_id {
        sql.push_str(" AND r.student_id = ?");
        binds.push(SqlValue::Text(id.clone()));
    }
    sql.push_str(" ORDER BY r.student_id, r.subject_code, r.term");

    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let raw = stmt
        .query_map(params_from_iter(binds), raw_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;
    raw.into_iter().map(RawRecord::decode).collect()
}

/// Upsert raw components and the computed result onto the same record.
pub fn write_record(
    conn: &Connection,
    key: &RecordKey,
    band: SubjectScoreBand,
    components: &Map<String, Value>,
    computed: &ComputedRecord,
) -> Result<String, CalcError> {
    let components_json =
        serde_json::to_string(components).map_err(|e| CalcError::new("serialize_failed", e.to_string()))?;
    let result_json = serde_json::to_string(&computed.result)
        .map_err(|e| CalcError::new("serialize_failed", e.to_string()))?;
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO score_records(
            id, student_id, subject_code, session, term, tier, band,
            components_json, result_json, total, grade, has_nonzero, computed_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, subject_code, session, term) DO UPDATE SET
           tier = excluded.tier,
           band = excluded.band,
           components_json = excluded.components_json,
           result_json = excluded.result_json,
           total = excluded.total,
           grade = excluded.grade,
           has_nonzero = excluded.has_nonzero,
           computed_at = excluded.computed_at,
           updated_at = excluded.updated_at",
        rusqlite::params![
            Uuid::new_v4().to_string(),
            &key.student_id,
            &key.subject_code,
            &key.session,
            key.term.as_str(),
            band.tier().as_str(),
            band.key(),
            components_json,
            result_json,
            computed.total,
            computed.grade.map(|g| g.as_str()),
            computed.has_nonzero as i64,
            &now,
            &now,
        ],
    )
    .map_err(|e| CalcError::new("db_update_failed", e.to_string()))?;

    conn.query_row(
        "SELECT id FROM score_records
         WHERE student_id = ? AND subject_code = ? AND session = ? AND term = ?",
        (
            &key.student_id,
            &key.subject_code,
            &key.session,
            key.term.as_str(),
        ),
        |r| r.get(0),
    )
    .map_err(db_err)
}

/// The half-yearly total on record for a junior subject, if one was computed.
pub fn half_yearly_total(
    conn: &Connection,
    student_id: &str,
    subject_code: &str,
    session: &str,
) -> Result<Option<TermTotal>, CalcError> {
    let key = RecordKey {
        student_id: student_id.to_string(),
        subject_code: subject_code.to_string(),
        session: session.to_string(),
        term: SessionTerm::HalfYearly,
    };
    Ok(find_record(conn, &key)?.and_then(|r| {
        r.total.map(|total| TermTotal {
            total,
            band: r.band,
        })
    }))
}
