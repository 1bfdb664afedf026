// CLI integration tests for the offline commands and error reporting.
use std::path::Path;
use std::process::Command;

use serde_json::{Value, json};

fn cmd() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_kechain"));
    for key in [
        "KECHAIN_URL",
        "KECHAIN_TOKEN",
        "KECHAIN_USERNAME",
        "KECHAIN_PASSWORD",
        "KECHAIN_SCOPE",
        "KECHAIN_SCOPE_ID",
        "KECHAIN_FORCE_ENV_USE",
    ] {
        command.env_remove(key);
    }
    command
}

fn parse_json_line(output: &[u8]) -> Value {
    let text = String::from_utf8_lossy(output);
    let line = text.lines().next().expect("json line");
    serde_json::from_str(line).expect("valid json")
}

fn write_json(dir: &Path, name: &str, value: &Value) -> String {
    let path = dir.join(name);
    std::fs::write(&path, value.to_string()).expect("write fixture");
    path.to_str().expect("utf8 path").to_string()
}

#[test]
fn widget_validate_accepts_valid_meta() {
    let temp = tempfile::tempdir().expect("tempdir");
    let meta = write_json(temp.path(), "meta.json", &json!({"collapsed": false, "showTitle": true}));

    let output = cmd()
        .args(["widget-validate", &meta, "--widget-type", "superGridWidget"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let report = parse_json_line(&output.stdout);
    assert_eq!(report["valid"], json!(true));
    assert_eq!(report["widget_type"], json!("SUPERGRID"));
    assert_eq!(report["schema"], json!("generic"));
}

#[test]
fn widget_validate_reports_schema_violation() {
    let temp = tempfile::tempdir().expect("tempdir");
    let meta = write_json(temp.path(), "meta.json", &json!({"collapsed": "no"}));

    let output = cmd().args(["widget-validate", &meta]).output().expect("run");
    assert_eq!(output.status.code(), Some(7));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], json!("SchemaViolation"));
    assert_eq!(err["error"]["pointer"], json!("/collapsed"));
}

#[test]
fn widget_validate_uses_custom_schema_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = write_json(
        temp.path(),
        "schema.json",
        &json!({"type": "object", "required": ["customHeight"]}),
    );
    let meta = write_json(temp.path(), "meta.json", &json!({"collapsed": true}));

    let output = cmd()
        .args(["widget-validate", &meta, "--schema", &schema])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(7));

    let meta = write_json(temp.path(), "ok.json", &json!({"customHeight": 300}));
    let output = cmd()
        .args(["widget-validate", &meta, "--schema", &schema])
        .output()
        .expect("run");
    assert!(output.status.success());
    assert_eq!(parse_json_line(&output.stdout)["schema"], json!("custom"));
}

#[test]
fn missing_meta_file_is_io_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let missing = temp.path().join("absent.json");

    let output = cmd()
        .args(["widget-validate", missing.to_str().expect("utf8")])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(8));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], json!("Io"));
    assert!(err["error"]["causes"].is_array());
}

#[test]
fn invalid_json_meta_is_illegal_argument() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("broken.json");
    std::fs::write(&path, "{not json").expect("write");

    let output = cmd()
        .args(["widget-validate", path.to_str().expect("utf8")])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn online_command_without_connection_is_client_error() {
    let output = cmd().args(["part", "6f7bc9f0-228e-4d3a-9dc0-ec5a75d73e1d"]).output().expect("run");
    assert_eq!(output.status.code(), Some(2));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], json!("Client"));
    assert!(err["error"]["hint"].as_str().is_some());
}

#[test]
fn unknown_flag_is_usage_error() {
    let output = cmd().args(["parts", "--bogus"]).output().expect("run");
    assert_eq!(output.status.code(), Some(2));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], json!("Client"));
    assert_eq!(err["error"]["hint"], json!("Try `kechain parts --help`."));
}

#[test]
fn widget_validate_with_server_needs_a_connection() {
    let temp = tempfile::tempdir().expect("tempdir");
    let meta = write_json(temp.path(), "meta.json", &json!({}));
    let output = cmd()
        .args(["widget-validate", &meta, "--widget-type", "superGrid", "--server"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(2));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], json!("Client"));
}

#[test]
fn scope_with_missing_env_file_is_io_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let missing = temp.path().join("absent.env");
    let output = cmd()
        .args(["scope", "--env-file", missing.to_str().expect("utf8")])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(8));
    let err = parse_json_line(&output.stderr);
    assert_eq!(err["error"]["kind"], json!("Io"));
}
