//! Free text to actions, or to a reply built from document reads.

pub mod rules;

use crate::address::{CellAddress, RangeAddress};
use crate::errors::{ErrorCode, ErrorInfo, PortError};
use crate::formatter::OutputFormatter;
use crate::port::DocumentPort;
use crate::protocol::{
    Action, ActionOp, Aggregation, CreatePivotTablePayload, DEFAULT_MAX_READ_CELLS, PivotValue,
    WriteCellPayload, WriteRangePayload, check_read_size,
};
use rules::{ParsedIntent, PivotRequest, ReadTarget};
use serde_json::Value;
use std::sync::Arc;

pub const HELP_TEXT: &str = "Try one of:\n\
  - Write value 42 to cell A1\n\
  - Write range A1:B2 values [[1, 2], [3, 4]]\n\
  - Show A1:C10\n\
  - What is in my selection?\n\
  - Create a pivot table from A1:D10 to F1 with rows: Category, columns: Region, values: sum of Sales";

/// Fallbacks for pivot fields the text does not mention.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotDefaults {
    pub source: RangeAddress,
    pub destination: RangeAddress,
    pub row_field: String,
    pub column_field: String,
    pub value_field: String,
    pub aggregation: Aggregation,
}

impl Default for PivotDefaults {
    fn default() -> Self {
        Self {
            source: RangeAddress::new(
                CellAddress { col: 1, row: 1 },
                CellAddress { col: 4, row: 10 },
            ),
            destination: RangeAddress::single(CellAddress { col: 6, row: 1 }),
            row_field: "Category".to_string(),
            column_field: "Region".to_string(),
            value_field: "Sales".to_string(),
            aggregation: Aggregation::Sum,
        }
    }
}

/// Reply produced without running any action.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalResponse {
    pub message: String,
    pub body: Option<String>,
    pub error: Option<ErrorInfo>,
}

impl LocalResponse {
    fn ok(message: impl Into<String>, body: Option<String>) -> Self {
        Self {
            message: message.into(),
            body,
            error: None,
        }
    }

    fn failed(message: impl Into<String>, error: ErrorInfo) -> Self {
        Self {
            message: message.into(),
            body: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionBatch {
    pub message: String,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Local(LocalResponse),
    Actions(ActionBatch),
    Unrecognized(LocalResponse),
}

pub struct IntentResolver {
    document: Arc<dyn DocumentPort>,
    formatter: OutputFormatter,
    pivot_defaults: PivotDefaults,
    default_read_range: RangeAddress,
    max_read_cells: usize,
}

impl IntentResolver {
    pub fn new(document: Arc<dyn DocumentPort>) -> Self {
        Self {
            document,
            formatter: OutputFormatter::default(),
            pivot_defaults: PivotDefaults::default(),
            default_read_range: RangeAddress::new(
                CellAddress { col: 1, row: 1 },
                CellAddress { col: 26, row: 100 },
            ),
            max_read_cells: DEFAULT_MAX_READ_CELLS,
        }
    }

    pub fn with_formatter(mut self, formatter: OutputFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_pivot_defaults(mut self, defaults: PivotDefaults) -> Self {
        self.pivot_defaults = defaults;
        self
    }

    pub fn with_default_read_range(mut self, range: RangeAddress) -> Self {
        self.default_read_range = range;
        self
    }

    pub fn with_max_read_cells(mut self, max_cells: usize) -> Self {
        self.max_read_cells = max_cells;
        self
    }

    /// Only reads touch the document. Read failures come back as a
    /// [`LocalResponse`] carrying the error.
    pub async fn resolve(&self, text: &str) -> Resolution {
        let Some((rule, intent)) = rules::parse(text) else {
            tracing::debug!("no rule matched");
            return Resolution::Unrecognized(LocalResponse {
                message: "I couldn't turn that into a spreadsheet action.".to_string(),
                body: Some(HELP_TEXT.to_string()),
                error: Some(ErrorInfo::new(
                    ErrorCode::Unrecognized,
                    "no rule matched the command",
                )),
            });
        };
        tracing::debug!(rule, "rule matched");

        match intent {
            ParsedIntent::Pivot(request) => Resolution::Actions(self.pivot_batch(request)),
            ParsedIntent::Read(target) => Resolution::Local(self.read(target).await),
            ParsedIntent::Selection => Resolution::Local(self.read(ReadTarget::Selection).await),
            ParsedIntent::WriteCell { address, value } => {
                let message = format!("Writing {value} to {address}");
                let action = Action::new(ActionOp::WriteCell(WriteCellPayload {
                    address,
                    value: Value::String(value),
                    format: None,
                }));
                Resolution::Actions(ActionBatch {
                    message,
                    actions: vec![action],
                })
            }
            ParsedIntent::WriteRange { range, values } => {
                let values = match values {
                    Ok(values) => values,
                    Err(err) => {
                        return Resolution::Local(LocalResponse::failed(
                            format!("The values for {range} are not a valid list: {}", err.message()),
                            ErrorInfo::new(ErrorCode::ValidationFailed, err.to_string()),
                        ));
                    }
                };
                match WriteRangePayload::new(range, values) {
                    Ok(payload) => Resolution::Actions(ActionBatch {
                        message: format!(
                            "Writing {}x{} values to {}",
                            payload.address.rows(),
                            payload.address.cols(),
                            payload.address
                        ),
                        actions: vec![Action::new(ActionOp::WriteRange(payload))],
                    }),
                    Err(err) => Resolution::Local(LocalResponse::failed(
                        format!("Those values don't fit {range}."),
                        ErrorInfo::from(&err),
                    )),
                }
            }
        }
    }

    fn pivot_batch(&self, request: PivotRequest) -> ActionBatch {
        let defaults = &self.pivot_defaults;
        let source = request.source.unwrap_or(defaults.source);
        let destination = request.destination.unwrap_or(defaults.destination);
        let row_field = request
            .row_field
            .unwrap_or_else(|| defaults.row_field.clone());
        let column_field = request
            .column_field
            .unwrap_or_else(|| defaults.column_field.clone());
        let value_field = request
            .value_field
            .unwrap_or_else(|| defaults.value_field.clone());
        let aggregation = request.aggregation.unwrap_or(defaults.aggregation);

        let message = format!(
            "Creating a pivot table from {source} at {destination} (rows: {row_field}; columns: {column_field}; values: {} of {value_field})",
            aggregation.as_str()
        );
        let description = format!("Summarize {value_field} by {row_field} and {column_field}");
        let payload = CreatePivotTablePayload {
            source_range: source,
            destination_range: destination,
            rows: vec![row_field],
            columns: vec![column_field],
            values: vec![PivotValue {
                field: value_field,
                aggregation,
            }],
        };
        ActionBatch {
            message,
            actions: vec![
                Action::new(ActionOp::CreatePivotTable(payload)).with_description(description),
            ],
        }
    }

    async fn read(&self, target: ReadTarget) -> LocalResponse {
        match self.read_target(target).await {
            Ok(response) => response,
            Err(err) => LocalResponse::failed(
                format!("Couldn't read the worksheet: {err}"),
                ErrorInfo::from(&err),
            ),
        }
    }

    async fn read_target(&self, target: ReadTarget) -> Result<LocalResponse, PortError> {
        let sheet = self.document.worksheet_name().await?;
        let (range, label) = match target {
            ReadTarget::Range(range) => (range, None),
            ReadTarget::Selection => (self.document.selection().await?, Some("selection")),
            ReadTarget::UsedRange => {
                let used = self.document.used_range().await?;
                (used.unwrap_or(self.default_read_range), None)
            }
        };
        if let Err(err) = check_read_size("read-range", &range, self.max_read_cells) {
            return Ok(LocalResponse::failed(
                format!("{sheet}!{range} is too large to show; ask for a smaller range."),
                ErrorInfo::from(&err),
            ));
        }
        let grid = self.document.read_grid(&range).await?;
        let body = self.formatter.format_at(&grid, range.start());
        let message = match label {
            Some(label) => format!("Your {label} is {sheet}!{range}"),
            None => format!("Contents of {sheet}!{range}"),
        };
        Ok(LocalResponse::ok(message, Some(body)))
    }
}
