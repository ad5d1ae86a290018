use super::format::FormattingSpec;
use super::kind::ActionKind;
use crate::address::{CellAddress, RangeAddress};
use crate::errors::ValidationError;
use crate::port::{Cell, Matrix};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WriteCellPayload {
    pub address: CellAddress,
    pub value: Cell,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<FormattingSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WriteRangePayload {
    /// Effective target; always the same shape as `values`.
    pub address: RangeAddress,
    pub values: Matrix,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<FormattingSpec>,
}

impl WriteRangePayload {
    /// The address must span exactly the shape of `values`.
    pub fn new(address: RangeAddress, values: Matrix) -> Result<Self, ValidationError> {
        let (rows, cols) = matrix_shape(&values)?;
        if address.rows() != rows || address.cols() != cols {
            return Err(ValidationError::DimensionMismatch {
                kind: WRITE_RANGE,
                address: address.to_string(),
                expected_rows: address.rows(),
                expected_cols: address.cols(),
                rows,
                cols,
            });
        }
        Ok(Self {
            address,
            values,
            format: None,
        })
    }

    /// Target derived from the matrix, with `anchor` as its top-left cell.
    pub fn anchored(anchor: CellAddress, values: Matrix) -> Result<Self, ValidationError> {
        let (rows, cols) = matrix_shape(&values)?;
        let address = RangeAddress::anchored(anchor, rows, cols)
            .map_err(|err| ValidationError::invalid(WRITE_RANGE, "anchor", err.to_string()))?;
        Ok(Self {
            address,
            values,
            format: None,
        })
    }
}

const WRITE_RANGE: &str = "write-range";

/// Rows and columns of a non-empty rectangular matrix.
fn matrix_shape(values: &Matrix) -> Result<(usize, usize), ValidationError> {
    let Some(first) = values.first() else {
        return Err(ValidationError::invalid(WRITE_RANGE, "values", "must not be empty"));
    };
    let cols = first.len();
    if cols == 0 {
        return Err(ValidationError::invalid(
            WRITE_RANGE,
            "values",
            "rows must not be empty",
        ));
    }
    for (idx, row) in values.iter().enumerate() {
        if row.len() != cols {
            return Err(ValidationError::JaggedMatrix {
                kind: WRITE_RANGE,
                row: idx,
                expected: cols,
                found: row.len(),
            });
        }
    }
    Ok((values.len(), cols))
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ReadCellPayload {
    pub address: CellAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ReadRangePayload {
    pub address: RangeAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct FormatPayload {
    pub address: RangeAddress,
    pub format: FormattingSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct WorksheetPayload {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct RenameWorksheetPayload {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct InsertFormulaPayload {
    pub address: CellAddress,
    /// Stored without the leading `=`.
    pub formula: String,
    #[serde(skip)]
    pub(crate) stripped_prefix: bool,
}

impl InsertFormulaPayload {
    pub fn stripped_prefix(&self) -> bool {
        self.stripped_prefix
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Column,
    Bar,
    Line,
    Pie,
    Area,
    Scatter,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateChartPayload {
    pub source_range: RangeAddress,
    pub chart_type: ChartType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<CellAddress>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Sum,
    Count,
    Average,
    Max,
    Min,
}

impl Aggregation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Average => "average",
            Self::Max => "max",
            Self::Min => "min",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sum" | "total" => Some(Self::Sum),
            "count" => Some(Self::Count),
            "average" | "avg" | "mean" => Some(Self::Average),
            "max" | "maximum" => Some(Self::Max),
            "min" | "minimum" => Some(Self::Min),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct PivotValue {
    pub field: String,
    pub aggregation: Aggregation,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePivotTablePayload {
    pub source_range: RangeAddress,
    pub destination_range: RangeAddress,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<PivotValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ApplyFilterPayload {
    pub address: RangeAddress,
    /// Zero-based column offset inside `address`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub criteria: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ConditionalOperator {
    #[serde(alias = "less_than")]
    LessThan,
    #[serde(alias = "less_than_or_equal")]
    LessThanOrEqual,
    #[serde(alias = "greater_than")]
    GreaterThan,
    #[serde(alias = "greater_than_or_equal")]
    GreaterThanOrEqual,
    Equal,
    #[serde(alias = "not_equal")]
    NotEqual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConditionalRule {
    #[serde(alias = "cell_is")]
    CellIs {
        operator: ConditionalOperator,
        formula: String,
    },
    Expression { formula: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ConditionalFormattingPayload {
    pub address: RangeAddress,
    pub rule: ConditionalRule,
    pub format: FormattingSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ValidationKind {
    List,
    Whole,
    Decimal,
    Date,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub kind: ValidationKind,
    pub formula1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula2: Option<String>,
    #[serde(default = "default_true", alias = "allow_blank")]
    pub allow_blank: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct DataValidationPayload {
    pub address: RangeAddress,
    pub validation: ValidationRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct CustomPayload {
    pub operation: String,
    pub params: Value,
}

/// Validated operation. Each variant carries the payload for its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOp {
    WriteCell(WriteCellPayload),
    WriteRange(WriteRangePayload),
    ReadCell(ReadCellPayload),
    ReadRange(ReadRangePayload),
    FormatCell(FormatPayload),
    FormatRange(FormatPayload),
    CreateWorksheet(WorksheetPayload),
    DeleteWorksheet(WorksheetPayload),
    RenameWorksheet(RenameWorksheetPayload),
    InsertFormula(InsertFormulaPayload),
    CreateChart(CreateChartPayload),
    CreatePivotTable(CreatePivotTablePayload),
    ApplyFilter(ApplyFilterPayload),
    ApplyConditionalFormatting(ConditionalFormattingPayload),
    ApplyDataValidation(DataValidationPayload),
    Custom(CustomPayload),
}

impl ActionOp {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::WriteCell(_) => ActionKind::WriteCell,
            Self::WriteRange(_) => ActionKind::WriteRange,
            Self::ReadCell(_) => ActionKind::ReadCell,
            Self::ReadRange(_) => ActionKind::ReadRange,
            Self::FormatCell(_) => ActionKind::FormatCell,
            Self::FormatRange(_) => ActionKind::FormatRange,
            Self::CreateWorksheet(_) => ActionKind::CreateWorksheet,
            Self::DeleteWorksheet(_) => ActionKind::DeleteWorksheet,
            Self::RenameWorksheet(_) => ActionKind::RenameWorksheet,
            Self::InsertFormula(_) => ActionKind::InsertFormula,
            Self::CreateChart(_) => ActionKind::CreateChart,
            Self::CreatePivotTable(_) => ActionKind::CreatePivotTable,
            Self::ApplyFilter(_) => ActionKind::ApplyFilter,
            Self::ApplyConditionalFormatting(_) => ActionKind::ApplyConditionalFormatting,
            Self::ApplyDataValidation(_) => ActionKind::ApplyDataValidation,
            Self::Custom(_) => ActionKind::Custom,
        }
    }

    /// Payload as wire JSON (camelCase fields).
    pub fn payload_value(&self) -> Value {
        let value = match self {
            Self::WriteCell(p) => serde_json::to_value(p),
            Self::WriteRange(p) => serde_json::to_value(p),
            Self::ReadCell(p) => serde_json::to_value(p),
            Self::ReadRange(p) => serde_json::to_value(p),
            Self::FormatCell(p) | Self::FormatRange(p) => serde_json::to_value(p),
            Self::CreateWorksheet(p) | Self::DeleteWorksheet(p) => serde_json::to_value(p),
            Self::RenameWorksheet(p) => serde_json::to_value(p),
            Self::InsertFormula(p) => serde_json::to_value(p),
            Self::CreateChart(p) => serde_json::to_value(p),
            Self::CreatePivotTable(p) => serde_json::to_value(p),
            Self::ApplyFilter(p) => serde_json::to_value(p),
            Self::ApplyConditionalFormatting(p) => serde_json::to_value(p),
            Self::ApplyDataValidation(p) => serde_json::to_value(p),
            Self::Custom(p) => serde_json::to_value(p),
        };
        value.unwrap_or(Value::Null)
    }

    /// One-line description for logs.
    pub fn summary(&self) -> String {
        match self {
            Self::WriteCell(p) => format!("{} <- {}", p.address, p.value),
            Self::WriteRange(p) => format!(
                "{} <- {}x{} values",
                p.address,
                p.values.len(),
                p.values.first().map(Vec::len).unwrap_or(0)
            ),
            Self::ReadCell(p) => p.address.to_string(),
            Self::ReadRange(p) => p.address.to_string(),
            Self::FormatCell(p) | Self::FormatRange(p) => {
                format!("{} ({})", p.address, p.format.describe())
            }
            Self::CreateWorksheet(p) | Self::DeleteWorksheet(p) => p.name.clone(),
            Self::RenameWorksheet(p) => format!("{} -> {}", p.from, p.to),
            Self::InsertFormula(p) => format!("{} <- ={}", p.address, p.formula),
            Self::CreateChart(p) => format!("{:?} chart of {}", p.chart_type, p.source_range),
            Self::CreatePivotTable(p) => {
                format!("{} -> {}", p.source_range, p.destination_range)
            }
            Self::ApplyFilter(p) => p.address.to_string(),
            Self::ApplyConditionalFormatting(p) => p.address.to_string(),
            Self::ApplyDataValidation(p) => {
                format!("{} ({:?})", p.address, p.validation.kind)
            }
            Self::Custom(p) => p.operation.clone(),
        }
    }
}

/// A validated action. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub op: ActionOp,
    pub description: Option<String>,
}

impl Action {
    pub fn new(op: ActionOp) -> Self {
        Self {
            op,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.op.kind()
    }
}
