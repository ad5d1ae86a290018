use serde_json::json;
use sheet_intent::config::{AppConfig, CliArgs};
use sheet_intent::port::DocumentPort;
use sheet_intent::protocol::Aggregation;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn yaml_file_values_apply_and_cli_flags_win() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("sheet-intent.yaml");
    fs::write(
        &path,
        "max_line_width: 80\n\
         autosave: true\n\
         action_timeout_ms: 1500\n\
         selection: C3\n\
         log_filter: debug\n\
         pivot:\n  source: A1:F50\n  value_field: Revenue\n  aggregation: avg\n",
    )
    .expect("write config");

    let args = CliArgs {
        config: Some(path),
        max_line_width: Some(60),
        ..Default::default()
    };
    let config = AppConfig::from_args(args).expect("config");

    assert_eq!(config.max_line_width, 60);
    assert!(config.autosave);
    assert_eq!(config.action_timeout, Some(Duration::from_millis(1500)));
    assert_eq!(config.selection.map(|s| s.to_string()).as_deref(), Some("C3"));
    assert_eq!(config.log_filter, "debug");
    assert_eq!(config.pivot.source.to_string(), "A1:F50");
    assert_eq!(config.pivot.value_field, "Revenue");
    assert_eq!(config.pivot.aggregation, Aggregation::Average);
    assert_eq!(config.pivot.row_field, "Category");
    assert_eq!(config.pivot.destination.to_string(), "F1");
}

#[test]
fn json_config_is_accepted() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("config.json");
    fs::write(&path, r#"{"default_read_range": "B2:D4", "action_timeout_ms": 0}"#)
        .expect("write config");

    let config = AppConfig::from_args(CliArgs {
        config: Some(path),
        ..Default::default()
    })
    .expect("config");

    assert_eq!(config.default_read_range.to_string(), "B2:D4");
    assert_eq!(config.action_timeout, None);
}

#[test]
fn config_errors_are_reported() {
    let tmp = tempdir().expect("tempdir");

    let missing = AppConfig::from_args(CliArgs {
        config: Some(tmp.path().join("nope.yaml")),
        ..Default::default()
    })
    .unwrap_err();
    assert!(missing.to_string().contains("does not exist"));

    let toml = tmp.path().join("config.toml");
    fs::write(&toml, "max_line_width = 3").expect("write config");
    let unsupported = AppConfig::from_args(CliArgs {
        config: Some(toml),
        ..Default::default()
    })
    .unwrap_err();
    assert!(unsupported.to_string().contains("unsupported config extension"));

    let yaml = tmp.path().join("bad.yml");
    fs::write(&yaml, "pivot:\n  aggregation: median\n").expect("write config");
    let bad_pivot = AppConfig::from_args(CliArgs {
        config: Some(yaml),
        ..Default::default()
    })
    .unwrap_err();
    assert!(bad_pivot.to_string().contains("pivot.aggregation 'median'"));
}

#[tokio::test(flavor = "current_thread")]
async fn grid_seed_opens_named_sheets() {
    let tmp = tempdir().expect("tempdir");
    let grid = tmp.path().join("grid.json");
    fs::write(
        &grid,
        json!({
            "sheets": [
                {"name": "Summary", "rows": [["total", 10]]},
                {"name": "Data", "rows": [["a", 1], ["b", 2]]}
            ]
        })
        .to_string(),
    )
    .expect("write grid");

    let config = AppConfig::from_args(CliArgs {
        grid: Some(grid),
        sheet: Some("Data".to_string()),
        selection: Some("A2:B2".to_string()),
        ..Default::default()
    })
    .expect("config");
    let document = config.open_document().expect("document");

    assert_eq!(document.name(), "memory");
    assert_eq!(document.worksheet_name().await.unwrap(), "Data");
    assert_eq!(document.selection().await.unwrap().to_string(), "A2:B2");
    let selection = document.selection().await.unwrap();
    assert_eq!(
        document.read_grid(&selection).await.unwrap(),
        vec![vec![json!("b"), json!(2)]]
    );
}

#[test]
fn unknown_sheet_in_grid_fails() {
    let tmp = tempdir().expect("tempdir");
    let grid = tmp.path().join("grid.json");
    fs::write(&grid, "[[1, 2]]").expect("write grid");

    let config = AppConfig::from_args(CliArgs {
        grid: Some(grid),
        sheet: Some("Missing".to_string()),
        ..Default::default()
    })
    .expect("config");

    let err = config.open_document().err().expect("missing sheet");
    assert!(err.to_string().contains("worksheet 'Missing' not found"));
}

#[tokio::test(flavor = "current_thread")]
async fn yaml_grid_seed_is_accepted() {
    let tmp = tempdir().expect("tempdir");
    let grid = tmp.path().join("grid.yaml");
    fs::write(&grid, "- [Item, Qty]\n- [Pen, 3]\n").expect("write grid");

    let config = AppConfig::from_args(CliArgs {
        grid: Some(grid),
        ..Default::default()
    })
    .expect("config");
    let document = config.open_document().expect("document");

    assert_eq!(
        document.read_grid(&"A2:B2".parse().unwrap()).await.unwrap(),
        vec![vec![json!("Pen"), json!(3)]]
    );
}
