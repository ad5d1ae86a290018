use serde_json::{Value, json};
use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(assert_cmd::cargo::cargo_bin!("sheet-intent"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run sheet-intent")
}

fn parse_stdout_json(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).expect("stdout utf8");
    serde_json::from_str(&stdout).expect("valid json")
}

fn parse_stderr_json(output: &std::process::Output) -> Value {
    let stderr = String::from_utf8(output.stderr.clone()).expect("stderr utf8");
    let last = stderr.lines().last().expect("stderr line");
    serde_json::from_str(last).expect("valid json")
}

#[test]
fn cli_resolve_write_returns_envelope() {
    let output = run_cli(&["resolve", "Write", "value", "42", "to", "cell", "A1"]);
    assert!(output.status.success(), "stderr: {:?}", output.stderr);

    let payload = parse_stdout_json(&output);
    assert_eq!(payload["message"], "Writing 42 to A1");
    assert_eq!(payload["actions"][0]["kind"], "write-cell");
    assert_eq!(payload["actions"][0]["payload"]["address"], "A1");
    assert_eq!(payload["metadata"]["success"], true);
}

#[test]
fn cli_resolve_reads_from_grid_seed() {
    let tmp = tempdir().expect("tempdir");
    let grid = tmp.path().join("grid.json");
    fs::write(&grid, r#"[["Item", "Qty"], ["Pen", 3]]"#).expect("write grid");

    let output = run_cli(&[
        "resolve",
        "--grid",
        grid.to_str().expect("path utf8"),
        "show A1:B2",
    ]);
    assert!(output.status.success(), "stderr: {:?}", output.stderr);

    let payload = parse_stdout_json(&output);
    assert_eq!(payload["message"], "Contents of Sheet1!A1:B2");
    assert_eq!(payload["body"], "Row 1: A1=Item, B1=Qty\nRow 2: A2=Pen, B2=3");
    assert_eq!(payload["actions"], json!([]));
}

#[test]
fn cli_execute_reports_partial_failure_in_metadata() {
    let tmp = tempdir().expect("tempdir");
    let actions = tmp.path().join("actions.json");
    fs::write(
        &actions,
        json!([
            {"type": "write-cell", "data": {"address": "A1", "value": "ok"}},
            {"type": "launch-rocket", "data": {}},
            {"type": "writeRange", "data": {"address": "B1:C1", "values": [[1, 2]]}}
        ])
        .to_string(),
    )
    .expect("write actions");

    let output = run_cli(&["execute", actions.to_str().expect("path utf8")]);
    assert!(output.status.success(), "stderr: {:?}", output.stderr);

    let payload = parse_stdout_json(&output);
    assert_eq!(payload["message"], "Applied 2 of 3 actions");
    assert_eq!(payload["metadata"]["success"], false);
    let errors = payload["metadata"]["errors"].as_array().expect("errors array");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["code"], "VALIDATION_FAILED");
}

#[test]
fn cli_format_renders_rows() {
    let tmp = tempdir().expect("tempdir");
    let grid = tmp.path().join("grid.json");
    fs::write(&grid, r#"[["A1", null, "C1"], [null, null, null]]"#).expect("write grid");

    let output = run_cli(&[
        "format",
        grid.to_str().expect("path utf8"),
        "--origin",
        "B3",
    ]);
    assert!(output.status.success(), "stderr: {:?}", output.stderr);

    let payload = parse_stdout_json(&output);
    assert_eq!(payload["text"], "Row 3: B3=A1, D3=C1");
}

#[test]
fn cli_schema_describes_both_envelopes() {
    let incoming = run_cli(&["schema"]);
    assert!(incoming.status.success(), "stderr: {:?}", incoming.stderr);
    let schema = parse_stdout_json(&incoming);
    assert!(schema["properties"]["actions"].is_object());

    let response = run_cli(&["schema", "--response", "--compact"]);
    assert!(response.status.success(), "stderr: {:?}", response.stderr);
    let stdout = String::from_utf8(response.stdout.clone()).expect("stdout utf8");
    assert_eq!(stdout.trim_end().lines().count(), 1);
    let schema: Value = serde_json::from_str(&stdout).expect("valid json");
    assert!(schema["properties"]["metadata"].is_object());
}

#[test]
fn cli_missing_input_emits_error_envelope() {
    let tmp = tempdir().expect("tempdir");
    let missing = tmp.path().join("missing.json");

    let output = run_cli(&["execute", missing.to_str().expect("path utf8")]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());

    let envelope = parse_stderr_json(&output);
    assert_eq!(envelope["code"], "FILE_NOT_FOUND");
    assert!(envelope["try_this"].is_string());
}

#[test]
fn cli_invalid_selection_is_an_argument_error() {
    let output = run_cli(&["resolve", "--selection", "ZZZZ0", "show", "selection"]);
    assert_eq!(output.status.code(), Some(1));

    let envelope = parse_stderr_json(&output);
    assert_eq!(envelope["code"], "INVALID_ARGUMENT");
}
