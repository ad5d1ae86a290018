use super::envelope::RawAction;
use super::format::FormattingSpec;
use super::kind::ActionKind;
use super::payload::*;
use crate::address::{CellAddress, RangeAddress};
use crate::errors::ValidationError;
use crate::port::Matrix;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

const SHEET_NAME_MAX: usize = 31;
const SHEET_NAME_FORBIDDEN: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Largest range a single read may cover unless configured otherwise.
pub const DEFAULT_MAX_READ_CELLS: usize = 10_000;

/// Refuses a read of `range` that would cover more than `max_cells` cells.
pub fn check_read_size(
    kind: &'static str,
    range: &RangeAddress,
    max_cells: usize,
) -> Result<(), ValidationError> {
    let cells = range.cell_count();
    if cells > max_cells {
        return Err(ValidationError::RangeTooLarge {
            kind,
            address: range.to_string(),
            cells,
            max: max_cells,
        });
    }
    Ok(())
}

/// Turn a wire action into a typed [`Action`]. Unknown kinds fail closed and
/// unknown payload fields are ignored.
pub fn validate(raw: &RawAction) -> Result<Action, ValidationError> {
    let name = raw.kind.trim();
    if name.is_empty() {
        return Err(ValidationError::MissingKind);
    }
    let kind = ActionKind::parse(name).ok_or_else(|| ValidationError::UnknownKind(name.to_string()))?;

    let empty = Map::new();
    let map = match &raw.payload {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => {
            return Err(ValidationError::invalid(
                kind.as_str(),
                "payload",
                "expected an object",
            ));
        }
    };
    let reader = PayloadReader {
        kind: kind.as_str(),
        map,
    };

    let op = match kind {
        ActionKind::WriteCell => {
            let value = reader
                .get("value")
                .cloned()
                .ok_or(reader.missing("value"))?;
            ActionOp::WriteCell(WriteCellPayload {
                address: reader.cell("address")?,
                value,
                format: reader.format("format", false)?,
            })
        }
        ActionKind::WriteRange => {
            let values: Matrix = reader.typed("values")?;
            let mut payload = match (reader.get("address"), reader.optional_cell("anchor")?) {
                (None, Some(anchor)) => WriteRangePayload::anchored(anchor, values)?,
                _ => WriteRangePayload::new(reader.range("address")?, values)?,
            };
            payload.format = reader.format("format", false)?;
            ActionOp::WriteRange(payload)
        }
        ActionKind::ReadCell => ActionOp::ReadCell(ReadCellPayload {
            address: reader.cell("address")?,
        }),
        ActionKind::ReadRange => ActionOp::ReadRange(ReadRangePayload {
            address: reader.range("address")?,
        }),
        ActionKind::FormatCell => ActionOp::FormatCell(FormatPayload {
            address: reader.cell("address")?.into(),
            format: reader.required_format("format")?,
        }),
        ActionKind::FormatRange => ActionOp::FormatRange(FormatPayload {
            address: reader.range("address")?,
            format: reader.required_format("format")?,
        }),
        ActionKind::CreateWorksheet => ActionOp::CreateWorksheet(WorksheetPayload {
            name: reader.sheet_name("name")?,
        }),
        ActionKind::DeleteWorksheet => ActionOp::DeleteWorksheet(WorksheetPayload {
            name: reader.sheet_name("name")?,
        }),
        ActionKind::RenameWorksheet => ActionOp::RenameWorksheet(RenameWorksheetPayload {
            from: reader.sheet_name("from")?,
            to: reader.sheet_name("to")?,
        }),
        ActionKind::InsertFormula => {
            let address = reader.cell("address")?;
            let raw_formula = reader.required_str("formula")?;
            let (formula, stripped_prefix) = match raw_formula.strip_prefix('=') {
                Some(rest) => (rest.trim().to_string(), true),
                None => (raw_formula.to_string(), false),
            };
            if formula.is_empty() {
                return Err(reader.invalid("formula", "must not be empty"));
            }
            ActionOp::InsertFormula(InsertFormulaPayload {
                address,
                formula,
                stripped_prefix,
            })
        }
        ActionKind::CreateChart => ActionOp::CreateChart(CreateChartPayload {
            source_range: reader.range("sourceRange")?,
            chart_type: reader.optional_typed("chartType")?.unwrap_or_default(),
            title: reader.optional_str("title")?.map(str::to_string),
            destination: reader.optional_cell("destination")?,
        }),
        ActionKind::CreatePivotTable => ActionOp::CreatePivotTable(CreatePivotTablePayload {
            source_range: reader.range("sourceRange")?,
            destination_range: reader.range("destinationRange")?,
            rows: reader.string_list("rows")?,
            columns: reader.string_list("columns")?,
            values: reader.pivot_values("values")?,
        }),
        ActionKind::ApplyFilter => {
            let address = reader.range("address")?;
            let column = match reader.get("column") {
                None => None,
                Some(value) => {
                    let col = value
                        .as_u64()
                        .ok_or_else(|| reader.invalid("column", "expected a non-negative integer"))?;
                    if col >= address.cols() as u64 {
                        return Err(reader.invalid(
                            "column",
                            format!("offset {col} is outside {address}"),
                        ));
                    }
                    Some(col as u32)
                }
            };
            ActionOp::ApplyFilter(ApplyFilterPayload {
                address,
                column,
                criteria: reader.string_list("criteria")?,
            })
        }
        ActionKind::ApplyConditionalFormatting => {
            let address = reader.range("address")?;
            let rule = match reader.typed::<ConditionalRule>("rule")? {
                ConditionalRule::CellIs { operator, formula } => ConditionalRule::CellIs {
                    operator,
                    formula: reader.formula_text("rule.formula", &formula)?,
                },
                ConditionalRule::Expression { formula } => ConditionalRule::Expression {
                    formula: reader.formula_text("rule.formula", &formula)?,
                },
            };
            ActionOp::ApplyConditionalFormatting(ConditionalFormattingPayload {
                address,
                rule,
                format: reader.required_format("format")?,
            })
        }
        ActionKind::ApplyDataValidation => {
            let address = reader.range("address")?;
            let mut validation: ValidationRule = reader.typed("validation")?;
            validation.formula1 = reader.formula_text("validation.formula1", &validation.formula1)?;
            validation.formula2 = match validation.formula2.take() {
                Some(f) if !f.trim().is_empty() => {
                    Some(reader.formula_text("validation.formula2", &f)?)
                }
                _ => None,
            };
            ActionOp::ApplyDataValidation(DataValidationPayload {
                address,
                validation,
            })
        }
        ActionKind::Custom => {
            let operation = reader.required_str("operation")?.to_string();
            let params = reader
                .get("params")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()));
            ActionOp::Custom(CustomPayload { operation, params })
        }
    };

    Ok(Action {
        op,
        description: raw
            .description
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
    })
}

struct PayloadReader<'a> {
    kind: &'static str,
    map: &'a Map<String, Value>,
}

impl<'a> PayloadReader<'a> {
    /// Looks up the camelCase name, then its snake_case alias. Null counts as absent.
    fn get(&self, field: &'static str) -> Option<&'a Value> {
        self.map
            .get(field)
            .or_else(|| self.map.get(&snake_case(field)))
            .filter(|v| !v.is_null())
    }

    fn missing(&self, field: &'static str) -> ValidationError {
        ValidationError::MissingField {
            kind: self.kind,
            field,
        }
    }

    fn invalid(&self, field: &'static str, message: impl Into<String>) -> ValidationError {
        ValidationError::invalid(self.kind, field, message)
    }

    fn optional_str(&self, field: &'static str) -> Result<Option<&'a str>, ValidationError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim()).filter(|s| !s.is_empty())),
            Some(_) => Err(self.invalid(field, "expected a string")),
        }
    }

    fn required_str(&self, field: &'static str) -> Result<&'a str, ValidationError> {
        self.optional_str(field)?.ok_or_else(|| self.missing(field))
    }

    fn cell(&self, field: &'static str) -> Result<CellAddress, ValidationError> {
        let raw = self.required_str(field)?;
        self.parse_cell(field, raw)
    }

    fn optional_cell(&self, field: &'static str) -> Result<Option<CellAddress>, ValidationError> {
        self.optional_str(field)?
            .map(|raw| self.parse_cell(field, raw))
            .transpose()
    }

    fn parse_cell(&self, field: &'static str, raw: &str) -> Result<CellAddress, ValidationError> {
        match RangeAddress::parse(raw) {
            Ok(range) if range.is_single_cell() => Ok(range.start()),
            Ok(range) => Err(self.invalid(
                field,
                format!("expected a single cell, got range {range}"),
            )),
            Err(err) => Err(self.invalid(field, err.to_string())),
        }
    }

    fn range(&self, field: &'static str) -> Result<RangeAddress, ValidationError> {
        let raw = self.required_str(field)?;
        RangeAddress::parse(raw).map_err(|err| self.invalid(field, err.to_string()))
    }

    fn typed<T: DeserializeOwned>(&self, field: &'static str) -> Result<T, ValidationError> {
        self.optional_typed(field)?.ok_or_else(|| self.missing(field))
    }

    fn optional_typed<T: DeserializeOwned>(
        &self,
        field: &'static str,
    ) -> Result<Option<T>, ValidationError> {
        self.get(field)
            .map(|value| {
                serde_json::from_value(value.clone())
                    .map_err(|err| self.invalid(field, err.to_string()))
            })
            .transpose()
    }

    fn format(
        &self,
        field: &'static str,
        required: bool,
    ) -> Result<Option<FormattingSpec>, ValidationError> {
        let Some(spec) = self.optional_typed::<FormattingSpec>(field)? else {
            return if required {
                Err(self.missing(field))
            } else {
                Ok(None)
            };
        };
        if spec.is_empty() {
            if required {
                return Err(self.invalid(field, "must set at least one property"));
            }
            return Ok(None);
        }
        spec.normalized()
            .map(Some)
            .map_err(|(path, message)| self.invalid(path, message))
    }

    fn required_format(&self, field: &'static str) -> Result<FormattingSpec, ValidationError> {
        self.format(field, true)?.ok_or_else(|| self.missing(field))
    }

    fn sheet_name(&self, field: &'static str) -> Result<String, ValidationError> {
        let name = self.required_str(field)?;
        if name.chars().count() > SHEET_NAME_MAX {
            return Err(self.invalid(
                field,
                format!("worksheet names are limited to {SHEET_NAME_MAX} characters"),
            ));
        }
        if let Some(bad) = name.chars().find(|c| SHEET_NAME_FORBIDDEN.contains(c)) {
            return Err(self.invalid(field, format!("character '{bad}' is not allowed")));
        }
        Ok(name.to_string())
    }

    /// Accepts a single string or an array of strings.
    fn string_list(&self, field: &'static str) -> Result<Vec<String>, ValidationError> {
        match self.get(field) {
            None => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(non_empty(s).into_iter().collect()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(non_empty(s)),
                    _ => Err(self.invalid(field, "expected an array of strings")),
                })
                .filter_map(Result::transpose)
                .collect(),
            Some(_) => Err(self.invalid(field, "expected an array of strings")),
        }
    }

    fn pivot_values(&self, field: &'static str) -> Result<Vec<PivotValue>, ValidationError> {
        let items: Vec<&Value> = match self.get(field) {
            None => return Err(self.missing(field)),
            Some(Value::Array(items)) => items.iter().collect(),
            Some(other) => vec![other],
        };
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            let (name, aggregation) = match item {
                Value::String(s) => (s.as_str(), None),
                Value::Object(obj) => {
                    let name = obj.get("field").and_then(Value::as_str).ok_or_else(|| {
                        self.invalid(field, "each value needs a 'field' string")
                    })?;
                    let aggregation = obj
                        .get("aggregation")
                        .or_else(|| obj.get("function"))
                        .and_then(Value::as_str);
                    (name, aggregation)
                }
                _ => {
                    return Err(self.invalid(field, "expected objects like {\"field\": \"Sales\"}"));
                }
            };
            let Some(name) = non_empty(name) else {
                return Err(self.invalid(field, "value field name must not be empty"));
            };
            let aggregation = match aggregation {
                None => Aggregation::default(),
                Some(raw) => Aggregation::parse(raw).ok_or_else(|| {
                    self.invalid(
                        field,
                        format!("unknown aggregation '{raw}' (expected sum|count|average|max|min)"),
                    )
                })?,
            };
            values.push(PivotValue {
                field: name,
                aggregation,
            });
        }
        if values.is_empty() {
            return Err(self.invalid(field, "at least one value field is required"));
        }
        Ok(values)
    }

    fn formula_text(&self, field: &'static str, raw: &str) -> Result<String, ValidationError> {
        let trimmed = raw.trim();
        let body = trimmed.strip_prefix('=').unwrap_or(trimmed).trim();
        if body.is_empty() {
            return Err(self.invalid(field, "must not be empty"));
        }
        Ok(body.to_string())
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn snake_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for ch in field.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(kind: &str, payload: Value) -> RawAction {
        RawAction::new(kind, payload)
    }

    #[test]
    fn snake_case_aliases_are_accepted() {
        let action = validate(&raw(
            "create_pivot_table",
            json!({
                "source_range": "A1:D10",
                "destination_range": "F1",
                "rows": ["Category"],
                "values": [{"field": "Sales", "aggregation": "avg"}]
            }),
        ))
        .unwrap();
        let ActionOp::CreatePivotTable(payload) = action.op else {
            panic!("expected pivot");
        };
        assert_eq!(payload.values[0].aggregation, Aggregation::Average);
        assert!(payload.columns.is_empty());
    }

    #[test]
    fn write_cell_rejects_ranges_and_null_values() {
        let err = validate(&raw("write-cell", json!({"address": "A1:B2", "value": 1}))).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { field: "address", .. }));

        let err = validate(&raw("write-cell", json!({"address": "A1", "value": null}))).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                kind: "write-cell",
                field: "value"
            }
        );
    }

    #[test]
    fn worksheet_names_follow_excel_rules() {
        assert!(validate(&raw("create-worksheet", json!({"name": "Q1 Sales"}))).is_ok());
        assert!(validate(&raw("create-worksheet", json!({"name": "a/b"}))).is_err());
        assert!(validate(&raw("create-worksheet", json!({"name": "x".repeat(32)}))).is_err());
        assert!(validate(&raw("create-worksheet", json!({"name": "  "}))).is_err());
    }

    #[test]
    fn insert_formula_strips_prefix() {
        let action = validate(&raw(
            "insert-formula",
            json!({"address": "C1", "formula": "=SUM(A1:B1)"}),
        ))
        .unwrap();
        let ActionOp::InsertFormula(payload) = action.op else {
            panic!("expected formula");
        };
        assert_eq!(payload.formula, "SUM(A1:B1)");
        assert!(payload.stripped_prefix());
    }

    #[test]
    fn filter_column_must_be_inside_range() {
        assert!(validate(&raw("apply-filter", json!({"address": "A1:C10", "column": 2}))).is_ok());
        let err = validate(&raw("apply-filter", json!({"address": "A1:C10", "column": 3}))).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { field: "column", .. }));
    }

    #[test]
    fn format_range_requires_non_empty_format() {
        let err = validate(&raw("format-range", json!({"address": "A1:B2", "format": {}}))).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { field: "format", .. }));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = validate(&raw("read-range", json!(["A1"]))).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { field: "payload", .. }));
    }
}
