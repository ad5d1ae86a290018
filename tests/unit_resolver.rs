mod support;

use assert_matches::assert_matches;
use serde_json::json;
use sheet_intent::document::MemoryDocument;
use sheet_intent::errors::ErrorCode;
use sheet_intent::protocol::{ActionKind, ActionOp, Aggregation};
use sheet_intent::resolver::{HELP_TEXT, IntentResolver, PivotDefaults, Resolution};
use std::sync::Arc;
use support::{FlakyDocument, memory, range};

fn resolver() -> IntentResolver {
    IntentResolver::new(Arc::new(MemoryDocument::new()))
}

#[tokio::test(flavor = "current_thread")]
async fn write_value_to_cell() {
    let resolution = resolver().resolve("Write value 42 to cell A1").await;
    let Resolution::Actions(batch) = resolution else {
        panic!("expected actions, got {resolution:?}");
    };
    assert_eq!(batch.message, "Writing 42 to A1");
    assert_eq!(batch.actions.len(), 1);
    let ActionOp::WriteCell(payload) = &batch.actions[0].op else {
        panic!("expected write-cell");
    };
    assert_eq!(payload.address.to_string(), "A1");
    assert_eq!(payload.value, json!("42"));
}

#[tokio::test(flavor = "current_thread")]
async fn write_matrix_to_range() {
    let resolution = resolver()
        .resolve("Write range A1:B2 values [[1, 2], [3, 4]]")
        .await;
    let Resolution::Actions(batch) = resolution else {
        panic!("expected actions, got {resolution:?}");
    };
    assert_eq!(batch.message, "Writing 2x2 values to A1:B2");
    let ActionOp::WriteRange(payload) = &batch.actions[0].op else {
        panic!("expected write-range");
    };
    assert_eq!(payload.values, vec![vec![json!(1), json!(2)], vec![json!(3), json!(4)]]);
}

#[tokio::test(flavor = "current_thread")]
async fn bare_pivot_request_uses_defaults() {
    let resolution = resolver().resolve("Create a pivot table").await;
    let Resolution::Actions(batch) = resolution else {
        panic!("expected actions, got {resolution:?}");
    };
    let action = &batch.actions[0];
    assert_eq!(action.kind(), ActionKind::CreatePivotTable);
    let ActionOp::CreatePivotTable(payload) = &action.op else {
        panic!("expected pivot");
    };
    assert_eq!(payload.source_range, range("A1:D10"));
    assert_eq!(payload.destination_range, range("F1"));
    assert_eq!(payload.rows, vec!["Category".to_string()]);
    assert_eq!(payload.columns, vec!["Region".to_string()]);
    assert_eq!(payload.values[0].field, "Sales");
    assert_eq!(payload.values[0].aggregation, Aggregation::Sum);
    assert!(batch.message.contains("values: sum of Sales"));
}

#[tokio::test(flavor = "current_thread")]
async fn pivot_fields_override_configured_defaults() {
    let defaults = PivotDefaults {
        value_field: "Revenue".to_string(),
        ..PivotDefaults::default()
    };
    let resolver = resolver().with_pivot_defaults(defaults);

    let Resolution::Actions(batch) = resolver.resolve("build a pivot").await else {
        panic!("expected actions");
    };
    let ActionOp::CreatePivotTable(payload) = &batch.actions[0].op else {
        panic!("expected pivot");
    };
    assert_eq!(payload.values[0].field, "Revenue");

    let Resolution::Actions(batch) = resolver
        .resolve("Create a pivot table from B2:E20 to H2 with rows: Product, values: average of Units")
        .await
    else {
        panic!("expected actions");
    };
    let ActionOp::CreatePivotTable(payload) = &batch.actions[0].op else {
        panic!("expected pivot");
    };
    assert_eq!(payload.source_range, range("B2:E20"));
    assert_eq!(payload.destination_range, range("H2"));
    assert_eq!(payload.rows, vec!["Product".to_string()]);
    assert_eq!(payload.values[0].field, "Units");
    assert_eq!(payload.values[0].aggregation, Aggregation::Average);
}

#[tokio::test(flavor = "current_thread")]
async fn unmatched_text_falls_back_to_help() {
    let resolution = resolver().resolve("hello there").await;
    let Resolution::Unrecognized(local) = resolution else {
        panic!("expected fallback, got {resolution:?}");
    };
    assert_eq!(local.body.as_deref(), Some(HELP_TEXT));
    assert_eq!(local.error.unwrap().code, ErrorCode::Unrecognized);
}

#[tokio::test(flavor = "current_thread")]
async fn malformed_literal_is_a_local_failure() {
    let resolution = resolver()
        .resolve("Write range A1:B1 values [[1, 2]")
        .await;
    let Resolution::Local(local) = resolution else {
        panic!("expected local failure, got {resolution:?}");
    };
    assert_eq!(local.error.unwrap().code, ErrorCode::ValidationFailed);
    assert!(local.message.starts_with("The values for A1:B1 are not a valid list"));
}

#[tokio::test(flavor = "current_thread")]
async fn mismatched_dimensions_produce_no_action() {
    let resolution = resolver()
        .resolve("Write range A1:C3 values [[1, 2], [3, 4]]")
        .await;
    assert_matches!(resolution, Resolution::Local(local) if local.error.is_some());
}

#[tokio::test(flavor = "current_thread")]
async fn reads_never_produce_actions() {
    let doc = memory(vec![vec![json!("Name"), json!("Qty")], vec![json!("Pen"), json!(3)]]);
    let resolver = IntentResolver::new(doc.clone());

    let Resolution::Local(local) = resolver.resolve("Show A1:B2").await else {
        panic!("expected a local reply");
    };
    assert_eq!(local.message, "Contents of Sheet1!A1:B2");
    assert_eq!(
        local.body.as_deref(),
        Some("Row 1: A1=Name, B1=Qty\nRow 2: A2=Pen, B2=3")
    );

    let Resolution::Local(local) = resolver.resolve("show me everything").await else {
        panic!("expected a local reply");
    };
    assert_eq!(local.message, "Contents of Sheet1!A1:B2");

    doc.set_selection(range("B2"));
    let Resolution::Local(local) = resolver.resolve("What is in my selection?").await else {
        panic!("expected a local reply");
    };
    assert_eq!(local.message, "Your selection is Sheet1!B2");
    assert_eq!(local.body.as_deref(), Some("Row 2: B2=3"));
}

#[tokio::test(flavor = "current_thread")]
async fn empty_sheet_falls_back_to_default_read_range() {
    let resolver = IntentResolver::new(Arc::new(MemoryDocument::new()))
        .with_default_read_range(range("A1:C3"));
    let Resolution::Local(local) = resolver.resolve("display the sheet").await else {
        panic!("expected a local reply");
    };
    assert_eq!(local.message, "Contents of Sheet1!A1:C3");
    assert_eq!(local.body.as_deref(), Some("The worksheet is empty."));
}

#[tokio::test(flavor = "current_thread")]
async fn tall_range_keeps_its_shape() {
    let resolution = resolver()
        .resolve("Write range A1:B3 values [[1,2],[3,4],[5,6]]")
        .await;
    let Resolution::Actions(batch) = resolution else {
        panic!("expected actions, got {resolution:?}");
    };
    assert_eq!(batch.message, "Writing 3x2 values to A1:B3");
    let ActionOp::WriteRange(payload) = &batch.actions[0].op else {
        panic!("expected write-range");
    };
    assert_eq!(payload.address, range("A1:B3"));
    assert_eq!(payload.values.len(), 3);
    assert_eq!(payload.values[2], vec![json!(5), json!(6)]);
}

#[tokio::test(flavor = "current_thread")]
async fn fully_specified_pivot_sentence() {
    let resolution = resolver()
        .resolve("create a pivot table from A1:D10 to F1 with rows: Product, columns: Region, values: Sales")
        .await;
    let Resolution::Actions(batch) = resolution else {
        panic!("expected actions, got {resolution:?}");
    };
    assert_eq!(batch.actions.len(), 1);
    let ActionOp::CreatePivotTable(payload) = &batch.actions[0].op else {
        panic!("expected pivot");
    };
    assert_eq!(payload.source_range, range("A1:D10"));
    assert_eq!(payload.destination_range, range("F1"));
    assert_eq!(payload.rows, vec!["Product".to_string()]);
    assert_eq!(payload.columns, vec!["Region".to_string()]);
    assert_eq!(payload.values.len(), 1);
    assert_eq!(payload.values[0].field, "Sales");
    assert_eq!(payload.values[0].aggregation, Aggregation::Sum);
    assert_eq!(
        batch.message,
        "Creating a pivot table from A1:D10 at F1 (rows: Product; columns: Region; values: sum of Sales)"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn pivot_wins_over_a_write_in_the_same_sentence() {
    let resolution = resolver()
        .resolve("Write value 5 to A1 and create a pivot table")
        .await;
    let Resolution::Actions(batch) = resolution else {
        panic!("expected actions, got {resolution:?}");
    };
    assert_eq!(batch.actions.len(), 1);
    assert_eq!(batch.actions[0].kind(), ActionKind::CreatePivotTable);
}

#[tokio::test(flavor = "current_thread")]
async fn huge_reads_are_refused_without_touching_the_grid() {
    let doc = Arc::new(FlakyDocument::new());
    let resolver = IntentResolver::new(doc.clone());

    let Resolution::Local(local) = resolver.resolve("show A1:XFD1048576").await else {
        panic!("expected a local reply");
    };
    assert_eq!(local.error.unwrap().code, ErrorCode::ValidationFailed);
    assert_eq!(
        local.message,
        "Sheet1!A1:XFD1048576 is too large to show; ask for a smaller range."
    );
    assert!(doc.reads.lock().is_empty());

    let Resolution::Local(local) = resolver.resolve("show A1:B2").await else {
        panic!("expected a local reply");
    };
    assert!(local.error.is_none());
    assert_eq!(doc.reads.lock().as_slice(), &[range("A1:B2")]);
}
