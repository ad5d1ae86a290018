use super::envelope::RawAction;
use crate::errors::ErrorInfo;
use crate::port::{Cell, Matrix};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Deterministic summary of what an action did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    CellWritten {
        address: String,
        value: Cell,
    },
    RangeWritten {
        range: String,
        rows: usize,
        cols: usize,
    },
    CellRead {
        address: String,
        value: Cell,
    },
    RangeRead {
        range: String,
        values: Matrix,
    },
    Formatted {
        range: String,
        applied: String,
    },
    WorksheetCreated {
        name: String,
    },
    WorksheetDeleted {
        name: String,
    },
    WorksheetRenamed {
        from: String,
        to: String,
    },
    FormulaInserted {
        address: String,
        formula: String,
    },
    /// Chart, pivot table, filter or rule created by the document itself.
    Applied {
        target: String,
        detail: String,
    },
    /// Applied elsewhere than this document; carries steps for a person to follow.
    Acknowledged {
        instructions: String,
    },
    Custom {
        operation: String,
        result: Value,
    },
}

impl Effect {
    /// Whether the document content differs after this effect. Reads,
    /// acknowledgments and custom operations leave nothing to save.
    pub fn changes_content(&self) -> bool {
        !matches!(
            self,
            Self::CellRead { .. }
                | Self::RangeRead { .. }
                | Self::Acknowledged { .. }
                | Self::Custom { .. }
        )
    }
}

/// Result of one action. Built once by the executor and never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionOutcome {
    index: usize,
    action: RawAction,
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    effect: Option<Effect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    notes: Vec<String>,
}

impl ExecutionOutcome {
    pub fn succeeded(index: usize, action: RawAction, effect: Effect, notes: Vec<String>) -> Self {
        Self {
            index,
            action,
            ok: true,
            error: None,
            effect: Some(effect),
            notes,
        }
    }

    pub fn failed(index: usize, action: RawAction, error: ErrorInfo) -> Self {
        Self {
            index,
            action,
            ok: false,
            error: Some(error),
            effect: None,
            notes: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn action(&self) -> &RawAction {
        &self.action
    }

    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    pub fn effect(&self) -> Option<&Effect> {
        self.effect.as_ref()
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn changed_document(&self) -> bool {
        self.ok && self.effect.as_ref().is_some_and(Effect::changes_content)
    }

    pub fn is_acknowledgment(&self) -> bool {
        matches!(self.effect, Some(Effect::Acknowledged { .. }))
    }
}
