use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar(envs: &[(&str, &str)]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_vspd");
    let mut cmd = Command::new(exe);
    cmd.env_remove("VSPD_WORKSPACE")
        .env_remove("VSPD_BATCH_LIMIT")
        .env_remove("VSPD_EMAIL_DOMAIN");
    for (k, v) in envs {
        cmd.env(k, v);
    }
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn vspd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn parse_reports_fields_for_every_shape() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&[]);

    let std_id = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "ids.parse",
        json!({ "identifier": "VSP-24-JSS1-0042" }),
    );
    assert_eq!(std_id["isValid"], true);
    assert_eq!(std_id["prefix"], "VSP");
    assert_eq!(std_id["kind"], "student");
    assert_eq!(std_id["format"], "standard");
    assert_eq!(std_id["year"], 2024);
    assert_eq!(std_id["classCode"], "JSS1");
    assert_eq!(std_id["sequence"], 42);
    assert_eq!(std_id["isLegacy"], false);

    let section = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "ids.parse",
        json!({ "identifier": "VSP-PRY-23-0005" }),
    );
    assert_eq!(section["format"], "section");
    assert_eq!(section["section"], "PRY");
    assert_eq!(section["year"], 2023);

    let staff = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "ids.parse",
        json!({ "identifier": "VSP-STF-ACC-2022-0012" }),
    );
    assert_eq!(staff["kind"], "staff");
    assert_eq!(staff["format"], "department");
    assert_eq!(staff["department"], "ACC");
    assert_eq!(staff["sequence"], 12);

    let invalid = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "ids.parse",
        json!({ "identifier": "VSP-24-JSS1-42" }),
    );
    assert_eq!(invalid, json!({ "isValid": false }));

    let missing = request(&mut stdin, &mut reader, "5", "ids.parse", json!({}));
    assert_eq!(error_code(&missing), "bad_params");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn kind_narrows_parse_and_validate() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&[]);

    for (i, (identifier, kind, valid)) in [
        ("VSP-STF-00007", None, true),
        ("VSP-STF-00007", Some("staff"), true),
        ("VSP-STF-00007", Some("student"), false),
        ("VSP-24-00007", Some("student"), true),
        ("VSP-24-00007", Some("staff"), false),
        ("vsp-24-00007", None, false),
        ("", None, false),
    ]
    .into_iter()
    .enumerate()
    {
        let mut params = json!({ "identifier": identifier });
        if let Some(k) = kind {
            params["kind"] = json!(k);
        }
        let res = request_ok(&mut stdin, &mut reader, &format!("v{i}"), "ids.validate", params.clone());
        assert_eq!(res["valid"], valid, "validate {identifier} as {kind:?}");
        let parsed = request_ok(&mut stdin, &mut reader, &format!("p{i}"), "ids.parse", params);
        assert_eq!(parsed["isValid"], valid, "parse {identifier} as {kind:?}");
    }

    let bad_kind = request(
        &mut stdin,
        &mut reader,
        "x",
        "ids.validate",
        json!({ "identifier": "VSP-24-00007", "kind": "alumni" }),
    );
    assert_eq!(error_code(&bad_kind), "bad_params");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn badges_follow_identifier_shape() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&[]);

    for (i, (identifier, badge)) in [
        ("VSP-24-JSS1-0042", "VC-2024-00042"),
        ("VSP-NUR-26-0003", "VC-2026-00003"),
        ("VSP-L-20191234", "VC-L-191234"),
        ("VSP-STF-2024-0015", "VC-00015"),
        ("VSP-STF-L-2019-0456", "VC-00456"),
        ("not-an-id", "INVALID"),
    ]
    .into_iter()
    .enumerate()
    {
        let res = request_ok(
            &mut stdin,
            &mut reader,
            &format!("b{i}"),
            "ids.badge",
            json!({ "identifier": identifier }),
        );
        assert_eq!(res["badgeNumber"], badge, "{identifier}");
    }

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn usernames_use_configured_domain() {
    let (mut child, mut stdin, mut reader) =
        spawn_sidecar(&[("VSPD_EMAIL_DOMAIN", "school.test")]);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "ids.username",
        json!({ "firstName": "Ada", "lastName": "O'Brien-Eze", "identifier": "VSP-24-JSS1-0042" }),
    );
    assert_eq!(res["username"], "ada.obrieneze.42@school.test");

    let legacy = request_ok(
        &mut stdin,
        &mut reader,
        "1b",
        "ids.username",
        json!({ "firstName": "Ada", "lastName": "Obi", "identifier": "VSP-L-2019-0778" }),
    );
    assert_eq!(legacy["username"], "ada.obi.0778@school.test");

    let override_domain = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "ids.username",
        json!({
            "firstName": "Tunde",
            "lastName": "Bello",
            "identifier": "VSP-STF-00009",
            "domain": "staff.test"
        }),
    );
    assert_eq!(override_domain["username"], "tunde.bello.00009@staff.test");

    let missing = request(
        &mut stdin,
        &mut reader,
        "3",
        "ids.username",
        json!({ "firstName": "Ada", "identifier": "VSP-24-00001" }),
    );
    assert_eq!(error_code(&missing), "bad_params");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn class_tables_resolve_both_ways() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&[]);

    let codes = request_ok(&mut stdin, &mut reader, "1", "classes.codes", json!({}));
    let classes = codes["classes"].as_array().expect("classes");
    assert!(classes
        .iter()
        .any(|c| c["code"] == "JSS1" && c["section"] == "college"));
    assert_eq!(codes["sections"].as_array().map(|s| s.len()), Some(4));

    let by_code = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.lookup",
        json!({ "code": "pry3" }),
    );
    assert_eq!(by_code["code"], "PRY3");
    assert_eq!(by_code["name"], "Primary 3");
    assert_eq!(by_code["section"]["code"], "PRY");

    let by_name = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.lookup",
        json!({ "name": "Nursery 2" }),
    );
    assert_eq!(by_name["code"], "NUR2");

    let unknown = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "classes.lookup",
        json!({ "code": "XYZ9" }),
    );
    assert!(unknown["name"].is_null());

    let missing = request(&mut stdin, &mut reader, "5", "classes.lookup", json!({}));
    assert_eq!(error_code(&missing), "bad_params");

    drop(stdin);
    let _ = child.wait();
}
