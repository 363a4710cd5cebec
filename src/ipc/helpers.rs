//! Parameter extraction shared by the handler families. Each helper returns
//! the ready-made error response on failure so handlers can early-return it.

use rusqlite::Connection;
use serde_json::Value;

use super::error::err;
use super::types::{AppState, Request};
use crate::calc::{ReportScope, Tier};

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(err(&req.id, "bad_params", format!("{} must be a string", key), None)),
    }
}

pub fn optional_i64(req: &Request, key: &str) -> Result<Option<i64>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be an integer", key), None)),
    }
}

pub fn optional_bool(req: &Request, key: &str) -> Result<Option<bool>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be boolean", key), None)),
    }
}

pub fn optional_tier(req: &Request, key: &str) -> Result<Option<Tier>, Value> {
    let Some(raw) = optional_str(req, key)? else {
        return Ok(None);
    };
    Tier::parse(&raw).map(Some).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("{} must be one of: junior, senior, higher", key),
            None,
        )
    })
}

pub fn report_scope(req: &Request) -> Result<ReportScope, Value> {
    match optional_str(req, "scope")? {
        None => Ok(ReportScope::default()),
        Some(raw) => ReportScope::parse(&raw).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "scope must be one of: halfYearly, annual",
                None,
            )
        }),
    }
}
