use crate::calc::band::canonical_code;
use crate::calc::GradingCatalog;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use crate::records;
use serde_json::{json, Map, Value};

const MAX_CODE_LEN: usize = 16;

#[derive(Clone, Copy)]
enum SetupSection {
    Grading,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "grading" => Some(Self::Grading),
            _ => None,
        }
    }
}

fn parse_code(v: &Value, key: &str) -> Result<String, String> {
    let s = v
        .as_str()
        .ok_or_else(|| format!("{} entries must be strings", key))?;
    let code = canonical_code(s);
    if code.is_empty() {
        return Err(format!("{} entries must not be empty", key));
    }
    if code.len() > MAX_CODE_LEN {
        return Err(format!("{} entries must be <= {} chars", key, MAX_CODE_LEN));
    }
    Ok(code)
}

fn parse_code_list(v: &Value, key: &str) -> Result<Vec<String>, String> {
    let items = v
        .as_array()
        .ok_or_else(|| format!("{} must be an array of subject codes", key))?;
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let code = parse_code(item, key)?;
        if !out.contains(&code) {
            out.push(code);
        }
    }
    Ok(out)
}

fn parse_language_pairs(v: &Value, key: &str) -> Result<Vec<[String; 2]>, String> {
    let items = v
        .as_array()
        .ok_or_else(|| format!("{} must be an array of [code, code] pairs", key))?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let pair = item
            .as_array()
            .filter(|p| p.len() == 2)
            .ok_or_else(|| format!("{} entries must be [code, code]", key))?;
        let a = parse_code(&pair[0], key)?;
        let b = parse_code(&pair[1], key)?;
        if a == b {
            return Err(format!("{} pair must name two different subjects", key));
        }
        out.push([a, b]);
    }
    Ok(out)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut GradingCatalog,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    for (k, v) in patch {
        match section {
            SetupSection::Grading => match k.as_str() {
                "fortyMarkCodes" => current.forty_mark_codes = parse_code_list(v, k)?,
                "thirtyMarkCodes" => current.thirty_mark_codes = parse_code_list(v, k)?,
                "vocationalCodes" => current.vocational_codes = parse_code_list(v, k)?,
                "practicalHeavyCodes" => current.practical_heavy_codes = parse_code_list(v, k)?,
                "languagePairs" => current.language_pairs = parse_language_pairs(v, k)?,
                _ => return Err(format!("unknown grading field: {}", k)),
            },
        }
    }

    // A junior subject has exactly one band.
    if let Some(dup) = current
        .forty_mark_codes
        .iter()
        .find(|c| current.thirty_mark_codes.contains(c))
    {
        return Err(format!(
            "{} cannot be both a forty-mark and a thirty-mark subject",
            dup
        ));
    }
    Ok(())
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grading = match records::load_catalog(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    ok(&req.id, json!({ "grading": grading }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match records::load_catalog(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = records::store_catalog(conn, &current) {
        return calc_err(&req.id, e);
    }
    tracing::info!(section = section_raw, "settings updated");
    ok(&req.id, json!({ "ok": true, "grading": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
