use crate::calc::band::canonical_code;
use crate::calc::{SubjectScoreBand, Tier};
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{db_conn, optional_i64, optional_str, optional_tier, required_str};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, SubjectRow};
use serde_json::json;

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let tier = match optional_tier(req, "tier") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match records::list_subjects(conn, tier) {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => calc_err(&req.id, e),
    }
}

/// Tier from `tier`, or else from `classLevel`.
fn subject_tier(req: &Request) -> Result<Tier, serde_json::Value> {
    if let Some(t) = optional_tier(req, "tier")? {
        return Ok(t);
    }
    match optional_i64(req, "classLevel")? {
        Some(level) => Tier::for_class_level(level).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "classLevel must be in 1..=12",
                Some(json!({ "classLevel": level })),
            )
        }),
        None => Err(err(&req.id, "bad_params", "missing tier or classLevel", None)),
    }
}

fn handle_subjects_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let code = match required_str(req, "code") {
        Ok(v) => canonical_code(&v),
        Err(e) => return e,
    };
    let tier = match subject_tier(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let explicit_band = match optional_str(req, "band") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let existing = match records::find_subject(conn, &code, tier) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    let name = match optional_str(req, "name") {
        Ok(v) => v
            .or_else(|| existing.as_ref().map(|s| s.name.clone()))
            .unwrap_or_else(|| code.clone()),
        Err(e) => return e,
    };
    let sort_order = match optional_i64(req, "sortOrder") {
        Ok(v) => v.or(existing.as_ref().map(|s| s.sort_order)).unwrap_or(0),
        Err(e) => return e,
    };

    let band = match explicit_band {
        Some(raw) => match SubjectScoreBand::parse(&raw) {
            Ok(b) if b.tier() == tier => b,
            Ok(b) => {
                return err(
                    &req.id,
                    "bad_params",
                    "band does not belong to this tier",
                    Some(json!({ "band": b.key(), "tier": tier.as_str() })),
                )
            }
            Err(e) => return calc_err(&req.id, e),
        },
        None => {
            let catalog = match records::load_catalog(conn) {
                Ok(v) => v,
                Err(e) => return calc_err(&req.id, e),
            };
            match catalog.resolve_band(tier, &code) {
                Ok(b) => b,
                Err(e) => return calc_err(&req.id, e),
            }
        }
    };

    let subject = SubjectRow {
        code,
        tier,
        name,
        band,
        sort_order,
    };
    if let Err(e) = records::upsert_subject(conn, &subject) {
        return calc_err(&req.id, e);
    }
    if let Some(prev) = existing.as_ref().filter(|p| p.band != band) {
        tracing::info!(
            code = %subject.code,
            from = prev.band.key(),
            to = band.key(),
            "subject band changed; stored results keep the old band until recalculated"
        );
    }
    ok(&req.id, json!({ "subject": subject }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.upsert" => Some(handle_subjects_upsert(state, req)),
        _ => None,
    }
}
