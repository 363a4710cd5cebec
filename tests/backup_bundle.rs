mod test_support;

use serde_json::json;
use std::fs::File;
use std::io::Read;
use test_support::{open_workspace, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn exported_bundle_restores_scores_into_another_workspace() {
    let (_ws, _child, mut stdin, mut reader) = open_workspace("gradebook-bundle-src");
    let out_dir = temp_dir("gradebook-bundle-out");
    let bundle = out_dir.join("workspace.zip");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.upsert",
        json!({ "id": "s1", "displayName": "Zoya", "classLevel": 10, "session": "2024-25" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "subjects.upsert",
        json!({ "code": "IT001", "tier": "senior" }),
    );
    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "scores.save",
        json!({
            "studentId": "s1", "subjectCode": "IT001",
            "components": { "theory": 64, "practical": 29 }
        }),
    );
    let export = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(export["bundleFormat"], "gradebook-workspace-v1");
    assert_eq!(export["entryCount"], 2);
    let sha = export["dbSha256"].as_str().expect("checksum").to_string();
    assert_eq!(sha.len(), 64);

    let mut archive = zip::ZipArchive::new(File::open(&bundle).expect("open bundle")).expect("zip");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    assert!(manifest.contains(&sha));
    archive.by_name("db/gradebook.sqlite3").expect("database entry");

    let target = temp_dir("gradebook-bundle-dst");
    let (_child2, mut stdin2, mut reader2) = spawn_sidecar();
    let imported = request_ok(
        &mut stdin2,
        &mut reader2,
        "1",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle.to_string_lossy(), "workspacePath": target.to_string_lossy() }),
    );
    assert_eq!(imported["bundleFormat"], "gradebook-workspace-v1");

    let restored = request_ok(
        &mut stdin2,
        &mut reader2,
        "2",
        "scores.get",
        json!({ "studentId": "s1", "subjectCode": "IT001" }),
    );
    assert_eq!(restored["record"]["result"], saved["record"]["result"]);
    assert_eq!(restored["record"]["result"]["overallGrade"], "A1");

    let code = request_err(
        &mut stdin2,
        &mut reader2,
        "3",
        "backup.importWorkspaceBundle",
        json!({ "inPath": out_dir.join("missing.zip").to_string_lossy() }),
    );
    assert_eq!(code, "not_found");
}
