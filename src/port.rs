use crate::address::{CellAddress, RangeAddress};
use crate::errors::PortError;
use crate::protocol::{
    ApplyFilterPayload, ConditionalFormattingPayload, CreateChartPayload,
    CreatePivotTablePayload, DataValidationPayload, FormattingSpec,
};
use async_trait::async_trait;
use serde_json::Value;

pub type Cell = Value;
pub type Matrix = Vec<Vec<Cell>>;

pub type PortResult<T> = Result<T, PortError>;

/// The document the executor and resolver act on. Implementations guard
/// their own state; callers never hold a lock across these calls.
#[async_trait]
pub trait DocumentPort: Send + Sync {
    /// Values of `range`, row-major, exactly `range.rows()` x `range.cols()`.
    async fn read_grid(&self, range: &RangeAddress) -> PortResult<Matrix>;
    async fn write_cell(&self, address: &CellAddress, value: &Cell) -> PortResult<()>;
    /// `values` has the same shape as `range`.
    async fn write_range(&self, range: &RangeAddress, values: &Matrix) -> PortResult<()>;
    async fn selection(&self) -> PortResult<RangeAddress>;
    async fn worksheet_name(&self) -> PortResult<String>;

    /// Bounding box of populated cells on the active worksheet, if known.
    async fn used_range(&self) -> PortResult<Option<RangeAddress>> {
        Ok(None)
    }

    /// `formula` has no leading `=`.
    async fn write_formula(&self, address: &CellAddress, formula: &str) -> PortResult<()> {
        self.write_cell(address, &Value::String(format!("={formula}")))
            .await
    }

    async fn apply_format(&self, _range: &RangeAddress, _format: &FormattingSpec) -> PortResult<()> {
        Err(PortError::unsupported("formatting"))
    }

    async fn create_worksheet(&self, _name: &str) -> PortResult<()> {
        Err(PortError::unsupported("creating worksheets"))
    }

    async fn delete_worksheet(&self, _name: &str) -> PortResult<()> {
        Err(PortError::unsupported("deleting worksheets"))
    }

    async fn rename_worksheet(&self, _from: &str, _to: &str) -> PortResult<()> {
        Err(PortError::unsupported("renaming worksheets"))
    }

    async fn create_chart(&self, _chart: &CreateChartPayload) -> PortResult<()> {
        Err(PortError::unsupported("charts"))
    }

    async fn create_pivot_table(&self, _pivot: &CreatePivotTablePayload) -> PortResult<()> {
        Err(PortError::unsupported("pivot tables"))
    }

    async fn apply_filter(&self, _filter: &ApplyFilterPayload) -> PortResult<()> {
        Err(PortError::unsupported("filters"))
    }

    async fn apply_conditional_formatting(
        &self,
        _rule: &ConditionalFormattingPayload,
    ) -> PortResult<()> {
        Err(PortError::unsupported("conditional formatting"))
    }

    async fn apply_data_validation(&self, _rule: &DataValidationPayload) -> PortResult<()> {
        Err(PortError::unsupported("data validation"))
    }

    async fn custom(&self, _operation: &str, _params: &Value) -> PortResult<Value> {
        Err(PortError::unsupported("custom operations"))
    }

    /// Called once after a batch that changed something. Default is a no-op.
    async fn save_hint(&self) -> PortResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}
