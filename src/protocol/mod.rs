//! Action vocabulary shared by the resolver, the executor and remote backends.

pub mod envelope;
pub mod format;
pub mod kind;
pub mod outcome;
pub mod payload;
pub mod validate;

pub use envelope::{IncomingEnvelope, RawAction, ResponseEnvelope, ResponseMetadata};
pub use format::{
    AlignmentSpec, BorderSide, BorderSpec, BorderStyle, FillSpec, FontSpec, FormattingSpec,
    HorizontalAlign, VerticalAlign, normalize_color,
};
pub use kind::ActionKind;
pub use outcome::{Effect, ExecutionOutcome};
pub use payload::{
    Action, ActionOp, Aggregation, ApplyFilterPayload, ChartType, ConditionalFormattingPayload,
    ConditionalOperator, ConditionalRule, CreateChartPayload, CreatePivotTablePayload,
    CustomPayload, DataValidationPayload, FormatPayload, InsertFormulaPayload, PivotValue,
    ReadCellPayload, ReadRangePayload, RenameWorksheetPayload, ValidationKind, ValidationRule,
    WorksheetPayload, WriteCellPayload, WriteRangePayload,
};
pub use validate::{DEFAULT_MAX_READ_CELLS, check_read_size, validate};
