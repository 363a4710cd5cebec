mod test_support;

use serde_json::json;
use test_support::{open_workspace, request_err, request_ok};

#[test]
fn grading_section_defaults_and_patches() {
    let (_ws, _child, mut stdin, mut reader) = open_workspace("gradebook-setup-grading");

    let setup = request_ok(&mut stdin, &mut reader, "1", "setup.get", json!({}));
    let grading = &setup["grading"];
    assert_eq!(grading["fortyMarkCodes"], json!(["COMP01", "GK01", "DRAW02"]));
    assert_eq!(grading["thirtyMarkCodes"], json!(["HIN01", "SAN01", "URD01"]));
    assert_eq!(grading["vocationalCodes"], json!(["IT001"]));
    assert_eq!(grading["practicalHeavyCodes"], json!(["PHE01"]));
    assert_eq!(grading["languagePairs"], json!([["SAN01", "URD01"]]));

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "setup.update",
        json!({
            "section": "grading",
            "patch": { "vocationalCodes": [" it001", "agr02"], "languagePairs": [["hin01", "san01"]] }
        }),
    );
    assert_eq!(updated["grading"]["vocationalCodes"], json!(["IT001", "AGR02"]));

    let setup = request_ok(&mut stdin, &mut reader, "3", "setup.get", json!({}));
    assert_eq!(setup["grading"]["languagePairs"], json!([["HIN01", "SAN01"]]));
    assert_eq!(setup["grading"]["fortyMarkCodes"], json!(["COMP01", "GK01", "DRAW02"]));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "setup.update",
        json!({ "section": "printer", "patch": {} }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "grading", "patch": { "thirtyMarkCodes": "HIN01" } }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "setup.update",
        json!({ "section": "grading", "patch": { "fortyMarkCodes": ["URD01"] } }),
    );
    assert_eq!(code, "bad_params");

    // A newly registered vocational code resolves to the vocational band.
    let subject = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "subjects.upsert",
        json!({ "code": "AGR02", "classLevel": 10 }),
    );
    assert_eq!(subject["subject"]["tier"], "senior");
    assert_eq!(subject["subject"]["band"], "senior_vocational");
}

#[test]
fn subject_band_override_must_match_tier() {
    let (_ws, _child, mut stdin, mut reader) = open_workspace("gradebook-setup-subjects");

    let pinned = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "subjects.upsert",
        json!({ "code": "MUS01", "tier": "junior", "band": "junior_thirty_mark" }),
    );
    assert_eq!(pinned["subject"]["band"], "junior_thirty_mark");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "subjects.upsert",
        json!({ "code": "MUS01", "tier": "junior", "band": "senior_standard" }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "subjects.upsert",
        json!({ "code": "MUS01", "tier": "junior", "band": "quarter_mark" }),
    );
    assert_eq!(code, "missing_band");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "subjects.upsert",
        json!({ "code": "MUS01" }),
    );
    assert_eq!(code, "bad_params");

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "subjects.list",
        json!({ "tier": "junior" }),
    );
    let subjects = listed["subjects"].as_array().expect("subjects");
    assert_eq!(subjects.len(), 1);
    assert_eq!(subjects[0]["band"], "junior_thirty_mark");

    let listed = request_ok(&mut stdin, &mut reader, "6", "subjects.list", json!({ "tier": "higher" }));
    assert_eq!(listed["subjects"].as_array().map(|a| a.len()), Some(0));
}
