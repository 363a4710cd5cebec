use crate::calc::Tier;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{db_conn, optional_bool, optional_i64, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, StudentRow};
use serde_json::json;
use uuid::Uuid;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
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
    let active_only = match optional_bool(req, "activeOnly") {
        Ok(v) => v.unwrap_or(false),
        Err(e) => return e,
    };

    match records::list_students(conn, session.as_deref(), class_level, active_only) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_students_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let display_name = match required_str(req, "displayName") {
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
    if Tier::for_class_level(class_level).is_none() {
        return err(
            &req.id,
            "bad_params",
            "classLevel must be in 1..=12",
            Some(json!({ "classLevel": class_level })),
        );
    }
    let section = match optional_str(req, "section") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match optional_str(req, "id") {
        Ok(v) => v.unwrap_or_else(|| Uuid::new_v4().to_string()),
        Err(e) => return e,
    };
    let existing = match records::find_student(conn, &id) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    let active = match optional_bool(req, "active") {
        Ok(v) => v.or(existing.as_ref().map(|s| s.active)).unwrap_or(true),
        Err(e) => return e,
    };
    let sort_order = match optional_i64(req, "sortOrder") {
        Ok(v) => v.or(existing.as_ref().map(|s| s.sort_order)).unwrap_or(0),
        Err(e) => return e,
    };

    let student = StudentRow {
        id,
        display_name,
        class_level,
        section,
        session,
        active,
        sort_order,
    };
    if let Err(e) = records::upsert_student(conn, &student) {
        return calc_err(&req.id, e);
    }
    tracing::debug!(student_id = %student.id, created = existing.is_none(), "student saved");
    ok(
        &req.id,
        json!({
            "student": student,
            "tier": student.tier().map(|t| t.as_str()),
            "created": existing.is_none(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.upsert" => Some(handle_students_upsert(state, req)),
        _ => None,
    }
}
