use crate::address::RangeAddress;
use crate::errors::{ErrorCode, ErrorInfo, PortError, ValidationError};
use crate::port::{DocumentPort, PortResult};
use crate::protocol::{
    Action, ActionOp, ConditionalRule, CreateChartPayload, CreatePivotTablePayload,
    DEFAULT_MAX_READ_CELLS, Effect, ExecutionOutcome, RawAction, check_read_size, validate,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Applies actions to a document one at a time, in order. A failed action is
/// recorded and the rest of the batch still runs.
pub struct ActionExecutor {
    document: Arc<dyn DocumentPort>,
    save_after_write: bool,
    action_timeout: Option<Duration>,
    max_read_cells: usize,
}

struct Applied {
    effect: Effect,
    notes: Vec<String>,
}

impl Applied {
    fn new(effect: Effect) -> Self {
        Self {
            effect,
            notes: Vec::new(),
        }
    }
}

impl ActionExecutor {
    pub fn new(document: Arc<dyn DocumentPort>) -> Self {
        Self {
            document,
            save_after_write: false,
            action_timeout: None,
            max_read_cells: DEFAULT_MAX_READ_CELLS,
        }
    }

    pub fn with_save_after_write(mut self, enabled: bool) -> Self {
        self.save_after_write = enabled;
        self
    }

    pub fn with_action_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.action_timeout = timeout.filter(|d| !d.is_zero());
        self
    }

    pub fn with_max_read_cells(mut self, max_cells: usize) -> Self {
        self.max_read_cells = max_cells;
        self
    }

    /// Typed actions are checked again before dispatch, since their payload
    /// fields can be built without going through [`validate`].
    pub async fn execute_all(&self, actions: &[Action]) -> Vec<ExecutionOutcome> {
        let mut outcomes = Vec::with_capacity(actions.len());
        for (index, action) in actions.iter().enumerate() {
            outcomes.push(self.step(index, RawAction::from(action), Some(action)).await);
        }
        self.finish(&outcomes).await;
        outcomes
    }

    /// Validates each action first; invalid ones fail without reaching the document.
    pub async fn execute_raw(&self, actions: &[RawAction]) -> Vec<ExecutionOutcome> {
        let mut outcomes = Vec::with_capacity(actions.len());
        for (index, raw) in actions.iter().enumerate() {
            outcomes.push(self.step(index, raw.clone(), None).await);
        }
        self.finish(&outcomes).await;
        outcomes
    }

    async fn step(&self, index: usize, wire: RawAction, built: Option<&Action>) -> ExecutionOutcome {
        let checked = validate(&wire).and_then(|mut action| {
            if let (Some(ActionOp::InsertFormula(original)), ActionOp::InsertFormula(payload)) =
                (built.map(|a| &a.op), &mut action.op)
            {
                payload.stripped_prefix |= original.stripped_prefix;
            }
            self.check_reads(&action.op)?;
            Ok(action)
        });
        match checked {
            Ok(action) => self.run(index, &action, wire).await,
            Err(err) => {
                warn!(index, kind = %wire.kind, error = %err, "action rejected");
                ExecutionOutcome::failed(index, wire, ErrorInfo::from(&err))
            }
        }
    }

    fn check_reads(&self, op: &ActionOp) -> Result<(), ValidationError> {
        match op {
            ActionOp::ReadRange(p) => check_read_size("read-range", &p.address, self.max_read_cells),
            _ => Ok(()),
        }
    }

    async fn run(&self, index: usize, action: &Action, wire: RawAction) -> ExecutionOutcome {
        let kind = action.kind();
        info!(index, kind = kind.as_str(), target = %action.op.summary(), "dispatching action");

        let result = match self.action_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.dispatch(&action.op)).await {
                Ok(result) => result.map_err(|err| ErrorInfo::from(&err)),
                Err(_) => Err(ErrorInfo::new(
                    ErrorCode::Timeout,
                    format!("{kind} timed out after {} ms", limit.as_millis()),
                )),
            },
            None => self
                .dispatch(&action.op)
                .await
                .map_err(|err| ErrorInfo::from(&err)),
        };

        match result {
            Ok(applied) => {
                if matches!(applied.effect, Effect::Acknowledged { .. }) {
                    info!(index, kind = kind.as_str(), "action acknowledged for manual follow-up");
                } else {
                    info!(index, kind = kind.as_str(), "action applied");
                }
                ExecutionOutcome::succeeded(index, wire, applied.effect, applied.notes)
            }
            Err(error) => {
                warn!(index, kind = kind.as_str(), error = %error.message, "action failed");
                ExecutionOutcome::failed(index, wire, error)
            }
        }
    }

    async fn finish(&self, outcomes: &[ExecutionOutcome]) {
        if !self.save_after_write || !outcomes.iter().any(ExecutionOutcome::changed_document) {
            return;
        }
        if let Err(err) = self.document.save_hint().await {
            warn!(error = %err, "save hint failed");
        }
    }

    async fn dispatch(&self, op: &ActionOp) -> PortResult<Applied> {
        let doc = self.document.as_ref();
        let mut notes = Vec::new();
        let effect = match op {
            ActionOp::WriteCell(p) => {
                doc.write_cell(&p.address, &p.value).await?;
                if p.format.is_some() {
                    notes.push(format_not_applied_note(&RangeAddress::single(p.address)));
                }
                Effect::CellWritten {
                    address: p.address.to_string(),
                    value: p.value.clone(),
                }
            }
            ActionOp::WriteRange(p) => {
                doc.write_range(&p.address, &p.values).await?;
                if p.format.is_some() {
                    notes.push(format_not_applied_note(&p.address));
                }
                Effect::RangeWritten {
                    range: p.address.to_string(),
                    rows: p.address.rows(),
                    cols: p.address.cols(),
                }
            }
            ActionOp::ReadCell(p) => {
                let grid = doc.read_grid(&RangeAddress::single(p.address)).await?;
                let value = grid
                    .into_iter()
                    .next()
                    .and_then(|row| row.into_iter().next())
                    .unwrap_or_default();
                Effect::CellRead {
                    address: p.address.to_string(),
                    value,
                }
            }
            ActionOp::ReadRange(p) => {
                let values = doc.read_grid(&p.address).await?;
                Effect::RangeRead {
                    range: p.address.to_string(),
                    values,
                }
            }
            ActionOp::FormatCell(p) | ActionOp::FormatRange(p) => {
                let result = doc.apply_format(&p.address, &p.format).await;
                let applied = p.format.describe();
                return advisory(result, op, || Effect::Formatted {
                    range: p.address.to_string(),
                    applied,
                });
            }
            ActionOp::CreateWorksheet(p) => {
                doc.create_worksheet(&p.name).await?;
                Effect::WorksheetCreated {
                    name: p.name.clone(),
                }
            }
            ActionOp::DeleteWorksheet(p) => {
                doc.delete_worksheet(&p.name).await?;
                Effect::WorksheetDeleted {
                    name: p.name.clone(),
                }
            }
            ActionOp::RenameWorksheet(p) => {
                doc.rename_worksheet(&p.from, &p.to).await?;
                Effect::WorksheetRenamed {
                    from: p.from.clone(),
                    to: p.to.clone(),
                }
            }
            ActionOp::InsertFormula(p) => {
                doc.write_formula(&p.address, &p.formula).await?;
                if p.stripped_prefix() {
                    notes.push(format!("Stripped leading '=' from formula at {}", p.address));
                }
                Effect::FormulaInserted {
                    address: p.address.to_string(),
                    formula: format!("={}", p.formula),
                }
            }
            ActionOp::CreateChart(p) => {
                let result = doc.create_chart(p).await;
                return advisory(result, op, || Effect::Applied {
                    target: p.destination.map(|d| d.to_string()).unwrap_or_default(),
                    detail: format!("{:?} chart of {}", p.chart_type, p.source_range).to_lowercase(),
                });
            }
            ActionOp::CreatePivotTable(p) => {
                let result = doc.create_pivot_table(p).await;
                return advisory(result, op, || Effect::Applied {
                    target: p.destination_range.to_string(),
                    detail: format!("pivot table of {}", p.source_range),
                });
            }
            ActionOp::ApplyFilter(p) => {
                let result = doc.apply_filter(p).await;
                return advisory(result, op, || Effect::Applied {
                    target: p.address.to_string(),
                    detail: "filter".to_string(),
                });
            }
            ActionOp::ApplyConditionalFormatting(p) => {
                let result = doc.apply_conditional_formatting(p).await;
                return advisory(result, op, || Effect::Applied {
                    target: p.address.to_string(),
                    detail: format!("conditional format ({})", p.format.describe()),
                });
            }
            ActionOp::ApplyDataValidation(p) => {
                let result = doc.apply_data_validation(p).await;
                return advisory(result, op, || Effect::Applied {
                    target: p.address.to_string(),
                    detail: format!("{:?} validation", p.validation.kind).to_lowercase(),
                });
            }
            ActionOp::Custom(p) => {
                let result = doc.custom(&p.operation, &p.params).await?;
                Effect::Custom {
                    operation: p.operation.clone(),
                    result,
                }
            }
        };
        Ok(Applied { effect, notes })
    }
}

/// Presentational actions the document cannot perform are acknowledged with
/// steps for the user instead of failing.
fn advisory(
    result: PortResult<()>,
    op: &ActionOp,
    effect: impl FnOnce() -> Effect,
) -> PortResult<Applied> {
    match result {
        Ok(()) => Ok(Applied::new(effect())),
        Err(err @ PortError::Unsupported { .. }) => Ok(Applied {
            effect: Effect::Acknowledged {
                instructions: manual_instructions(op),
            },
            notes: vec![format!("Not applied automatically: {err}")],
        }),
        Err(err) => Err(err),
    }
}

fn format_not_applied_note(range: &RangeAddress) -> String {
    format!("Formatting on a write is not applied; send a format action for {range}")
}

pub fn manual_instructions(op: &ActionOp) -> String {
    match op {
        ActionOp::FormatCell(p) | ActionOp::FormatRange(p) => {
            format!("Select {} and apply: {}.", p.address, p.format.describe())
        }
        ActionOp::CreateChart(p) => chart_instructions(p),
        ActionOp::CreatePivotTable(p) => pivot_instructions(p),
        ActionOp::ApplyFilter(p) => {
            let mut text = format!("Select {} and choose Data > Filter", p.address);
            if !p.criteria.is_empty() {
                let column = p
                    .address
                    .start()
                    .offset(0, p.column.unwrap_or(0))
                    .map(|c| crate::address::column_letters(c.col - 1))
                    .unwrap_or_default();
                text.push_str(&format!(
                    ", then filter column {column} to: {}",
                    p.criteria.join(", ")
                ));
            }
            text.push('.');
            text
        }
        ActionOp::ApplyConditionalFormatting(p) => {
            let rule = match &p.rule {
                ConditionalRule::CellIs { operator, formula } => {
                    format!("'Cell value {operator:?} {formula}'")
                }
                ConditionalRule::Expression { formula } => format!("the formula ={formula}"),
            };
            format!(
                "Select {}, choose Home > Conditional Formatting > New Rule, use {rule} and set: {}.",
                p.address,
                p.format.describe()
            )
        }
        ActionOp::ApplyDataValidation(p) => {
            let mut text = format!(
                "Select {}, choose Data > Data Validation and allow {:?} with {}",
                p.address, p.validation.kind, p.validation.formula1
            );
            if let Some(formula2) = &p.validation.formula2 {
                text.push_str(&format!(" to {formula2}"));
            }
            text.push('.');
            text
        }
        other => format!("Perform '{}' manually.", other.summary()),
    }
}

fn chart_instructions(p: &CreateChartPayload) -> String {
    let mut text = format!(
        "Select {}, choose Insert > Chart > {:?}",
        p.source_range, p.chart_type
    );
    if let Some(title) = &p.title {
        text.push_str(&format!(", title it '{title}'"));
    }
    if let Some(dest) = &p.destination {
        text.push_str(&format!(" and place it at {dest}"));
    }
    text.push('.');
    text
}

fn pivot_instructions(p: &CreatePivotTablePayload) -> String {
    let mut text = format!(
        "Select {}, choose Insert > PivotTable and place it at {}.",
        p.source_range, p.destination_range
    );
    if !p.rows.is_empty() {
        text.push_str(&format!(" Drag {} to Rows.", p.rows.join(", ")));
    }
    if !p.columns.is_empty() {
        text.push_str(&format!(" Drag {} to Columns.", p.columns.join(", ")));
    }
    let values: Vec<String> = p
        .values
        .iter()
        .map(|v| format!("{} of {}", v.aggregation.as_str(), v.field))
        .collect();
    text.push_str(&format!(" Add {} to Values.", values.join(", ")));
    text
}
