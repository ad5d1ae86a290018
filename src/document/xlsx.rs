use crate::address::{CellAddress, RangeAddress};
use crate::errors::PortError;
use crate::port::{Cell, DocumentPort, Matrix, PortResult};
use crate::protocol::{
    ApplyFilterPayload, BorderSide, ConditionalFormattingPayload, ConditionalOperator,
    ConditionalRule, DataValidationPayload, FormattingSpec, HorizontalAlign, ValidationKind,
    VerticalAlign,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Number, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use umya_spreadsheet::structs::{HorizontalAlignmentValues, VerticalAlignmentValues};
use umya_spreadsheet::{
    ConditionalFormatValues, ConditionalFormatting, ConditionalFormattingOperatorValues,
    ConditionalFormattingRule, DataValidation, DataValidationOperatorValues, DataValidationValues,
    DataValidations, Formula, PatternValues, Spreadsheet, Style, Worksheet,
};

const CF_DEFAULT_FILL: &str = "FFFFE0E0";
const CF_DEFAULT_FONT: &str = "FF000000";

/// Workbook on disk, edited in memory and written back on `save_hint`.
pub struct XlsxDocument {
    book: Arc<Mutex<Spreadsheet>>,
    path: PathBuf,
    active: RwLock<String>,
    selection: RwLock<RangeAddress>,
}

impl XlsxDocument {
    /// Opens `path`, or starts an empty workbook when the file does not exist yet.
    pub fn open(path: &Path, sheet: Option<&str>) -> Result<Self> {
        let book = if path.exists() {
            umya_spreadsheet::reader::xlsx::read(path)
                .with_context(|| format!("failed to read workbook '{}'", path.display()))?
        } else {
            umya_spreadsheet::new_file()
        };
        Self::from_book(book, path, sheet)
    }

    pub fn from_book(book: Spreadsheet, path: &Path, sheet: Option<&str>) -> Result<Self> {
        let active = match sheet {
            Some(name) => {
                anyhow::ensure!(
                    book.get_sheet_by_name(name).is_some(),
                    "sheet '{}' not found in '{}'",
                    name,
                    path.display()
                );
                name.to_string()
            }
            None => book
                .get_sheet_collection_no_check()
                .first()
                .map(|s| s.get_name().to_string())
                .context("workbook has no sheets")?,
        };
        Ok(Self {
            book: Arc::new(Mutex::new(book)),
            path: path.to_path_buf(),
            active: RwLock::new(active),
            selection: RwLock::new(RangeAddress::single(CellAddress { col: 1, row: 1 })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_selection(&self, range: RangeAddress) {
        *self.selection.write() = range;
    }

    fn with_sheet<R>(&self, f: impl FnOnce(&Worksheet) -> R) -> PortResult<R> {
        let name = self.active.read().clone();
        let book = self.book.lock();
        let sheet = book
            .get_sheet_by_name(&name)
            .ok_or(PortError::SheetNotFound(name))?;
        Ok(f(sheet))
    }

    fn with_sheet_mut<R>(&self, f: impl FnOnce(&mut Worksheet) -> PortResult<R>) -> PortResult<R> {
        let name = self.active.read().clone();
        let mut book = self.book.lock();
        let sheet = book
            .get_sheet_by_name_mut(&name)
            .ok_or(PortError::SheetNotFound(name))?;
        f(sheet)
    }

    fn sheet_position(book: &Spreadsheet, name: &str) -> Option<usize> {
        book.get_sheet_collection_no_check()
            .iter()
            .position(|s| s.get_name().eq_ignore_ascii_case(name))
    }
}

fn read_value(sheet: &Worksheet, address: &CellAddress) -> Cell {
    let Some(cell) = sheet.get_cell(address.to_string().as_str()) else {
        return Value::Null;
    };
    if cell.is_formula() {
        return Value::String(format!("={}", cell.get_formula()));
    }
    let raw = cell.get_value();
    if raw.is_empty() {
        return Value::Null;
    }
    number_from_text(&raw).unwrap_or_else(|| Value::String(raw.to_string()))
}

fn number_from_text(raw: &str) -> Option<Value> {
    let leading_zero = raw.len() > 1 && raw.starts_with('0') && !raw.starts_with("0.");
    if leading_zero {
        return None;
    }
    let n = raw.parse::<f64>().ok().filter(|n| n.is_finite())?;
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(Value::Number(Number::from(n as i64)))
    } else {
        Number::from_f64(n).map(Value::Number)
    }
}

fn write_value(sheet: &mut Worksheet, address: &CellAddress, value: &Cell) {
    let coord = address.to_string();
    if value.is_null() {
        sheet.remove_cell((address.col, address.row));
        return;
    }
    let cell = sheet.get_cell_mut(coord.as_str());
    cell.get_cell_value_mut().remove_formula();
    match value {
        Value::Number(n) => {
            cell.set_value_number(n.as_f64().unwrap_or_default());
        }
        Value::Bool(b) => {
            cell.set_value(if *b { "TRUE" } else { "FALSE" });
        }
        Value::String(s) => match s.strip_prefix('=') {
            Some(formula) if !formula.trim().is_empty() => {
                cell.set_formula(formula.to_string());
                cell.get_cell_value_mut()
                    .set_formula_result_default(String::new());
            }
            _ => {
                cell.set_value(s.clone());
            }
        },
        other => {
            cell.set_value(other.to_string());
        }
    }
}

fn apply_style(style: &mut Style, format: &FormattingSpec) {
    if let Some(font_spec) = &format.font {
        let font = style.get_font_mut();
        if let Some(name) = &font_spec.name {
            font.set_name(name.clone());
        }
        if let Some(size) = font_spec.size {
            font.set_size(size);
        }
        if let Some(bold) = font_spec.bold {
            font.set_bold(bold);
        }
        if let Some(italic) = font_spec.italic {
            font.set_italic(italic);
        }
        if let Some(underline) = font_spec.underline {
            font.set_underline(if underline { "single" } else { "none" });
        }
        if let Some(color) = &font_spec.color {
            font.get_color_mut().set_argb(color.clone());
        }
    }
    if let Some(color) = format.fill.as_ref().and_then(|f| f.color.as_ref()) {
        style
            .get_fill_mut()
            .get_pattern_fill_mut()
            .set_pattern_type(PatternValues::Solid)
            .get_foreground_color_mut()
            .set_argb(color.clone());
    }
    if let Some(border_spec) = &format.border {
        let kind = border_spec.style.map(|s| s.as_str()).unwrap_or("thin");
        let sides = border_spec.sides.clone().unwrap_or_else(|| {
            vec![
                BorderSide::Top,
                BorderSide::Bottom,
                BorderSide::Left,
                BorderSide::Right,
            ]
        });
        let borders = style.get_borders_mut();
        for side in sides {
            let border = match side {
                BorderSide::Top => borders.get_top_border_mut(),
                BorderSide::Bottom => borders.get_bottom_border_mut(),
                BorderSide::Left => borders.get_left_border_mut(),
                BorderSide::Right => borders.get_right_border_mut(),
            };
            border.set_border_style(kind);
            if let Some(color) = &border_spec.color {
                border.get_color_mut().set_argb(color.clone());
            }
        }
    }
    if let Some(alignment_spec) = &format.alignment {
        let alignment = style.get_alignment_mut();
        if let Some(h) = alignment_spec.horizontal {
            alignment.set_horizontal(match h {
                HorizontalAlign::Left => HorizontalAlignmentValues::Left,
                HorizontalAlign::Center => HorizontalAlignmentValues::Center,
                HorizontalAlign::Right => HorizontalAlignmentValues::Right,
                HorizontalAlign::Justify => HorizontalAlignmentValues::Justify,
            });
        }
        if let Some(v) = alignment_spec.vertical {
            alignment.set_vertical(match v {
                VerticalAlign::Top => VerticalAlignmentValues::Top,
                VerticalAlign::Center => VerticalAlignmentValues::Center,
                VerticalAlign::Bottom => VerticalAlignmentValues::Bottom,
            });
        }
        if let Some(wrap) = alignment_spec.wrap_text {
            alignment.set_wrap_text(wrap);
        }
    }
    if let Some(code) = &format.number_format {
        style.get_number_format_mut().set_format_code(code.clone());
    }
}

fn next_cf_priority(sheet: &Worksheet) -> i32 {
    let mut max_priority: i32 = 0;
    for cf in sheet.get_conditional_formatting_collection() {
        for rule in cf.get_conditional_collection() {
            max_priority = max_priority.max(*rule.get_priority());
        }
    }
    max_priority.saturating_add(1).max(1)
}

fn cf_operator(op: ConditionalOperator) -> ConditionalFormattingOperatorValues {
    match op {
        ConditionalOperator::LessThan => ConditionalFormattingOperatorValues::LessThan,
        ConditionalOperator::LessThanOrEqual => ConditionalFormattingOperatorValues::LessThanOrEqual,
        ConditionalOperator::GreaterThan => ConditionalFormattingOperatorValues::GreaterThan,
        ConditionalOperator::GreaterThanOrEqual => {
            ConditionalFormattingOperatorValues::GreaterThanOrEqual
        }
        ConditionalOperator::Equal => ConditionalFormattingOperatorValues::Equal,
        ConditionalOperator::NotEqual => ConditionalFormattingOperatorValues::NotEqual,
    }
}

fn append_conditional_format(sheet: &mut Worksheet, payload: &ConditionalFormattingPayload) {
    let format = &payload.format;
    let fill = format
        .fill
        .as_ref()
        .and_then(|f| f.color.as_deref())
        .unwrap_or(CF_DEFAULT_FILL);
    let font_color = format
        .font
        .as_ref()
        .and_then(|f| f.color.as_deref())
        .unwrap_or(CF_DEFAULT_FONT);
    let bold = format.font.as_ref().and_then(|f| f.bold).unwrap_or(false);

    let mut dxf = Style::default();
    dxf.get_fill_mut()
        .get_pattern_fill_mut()
        .set_pattern_type(PatternValues::Solid)
        .get_foreground_color_mut()
        .set_argb(fill);
    let font = dxf.get_font_mut();
    font.set_bold(bold);
    font.get_color_mut().set_argb(font_color);

    let mut rule = ConditionalFormattingRule::default();
    let formula_text = match &payload.rule {
        ConditionalRule::CellIs { operator, formula } => {
            rule.set_type(ConditionalFormatValues::CellIs);
            rule.set_operator(cf_operator(*operator));
            formula
        }
        ConditionalRule::Expression { formula } => {
            rule.set_type(ConditionalFormatValues::Expression);
            formula
        }
    };
    rule.set_priority(next_cf_priority(sheet));
    let mut formula = Formula::default();
    formula.set_string_value(formula_text.as_str());
    rule.set_formula(formula);
    rule.set_style(dxf);

    let mut cf = ConditionalFormatting::default();
    cf.get_sequence_of_references_mut()
        .set_sqref(payload.address.to_string());
    cf.add_conditional_collection(rule);
    sheet.add_conditional_formatting_collection(cf);
}

fn set_data_validation(sheet: &mut Worksheet, payload: &DataValidationPayload) -> PortResult<()> {
    let sqref = payload.address.to_string();
    if sheet.get_data_validations_mut().is_none() {
        sheet.set_data_validations(DataValidations::default());
    }
    let dvs = sheet
        .get_data_validations_mut()
        .ok_or_else(|| PortError::host("failed to initialize data validations"))?;

    // One validation per target range.
    dvs.get_data_validation_list_mut().retain(|dv| {
        dv.get_sequence_of_references()
            .get_sqref()
            .replace(' ', "")
            .to_ascii_uppercase()
            != sqref
    });

    let rule = &payload.validation;
    let mut dv = DataValidation::default();
    dv.set_type(match rule.kind {
        ValidationKind::List => DataValidationValues::List,
        ValidationKind::Whole => DataValidationValues::Whole,
        ValidationKind::Decimal => DataValidationValues::Decimal,
        ValidationKind::Date => DataValidationValues::Date,
        ValidationKind::Custom => DataValidationValues::Custom,
    });
    dv.get_sequence_of_references_mut().set_sqref(sqref.clone());
    dv.set_allow_blank(rule.allow_blank);
    dv.set_formula1(rule.formula1.clone());
    if let Some(formula2) = &rule.formula2 {
        dv.set_formula2(formula2.clone());
    }
    if matches!(
        rule.kind,
        ValidationKind::Whole | ValidationKind::Decimal | ValidationKind::Date
    ) {
        dv.set_operator(if rule.formula2.is_some() {
            DataValidationOperatorValues::Between
        } else {
            DataValidationOperatorValues::Equal
        });
    }
    if let Some(prompt) = &rule.prompt {
        dv.set_show_input_message(true);
        dv.set_prompt(prompt.clone());
    }
    if let Some(error) = &rule.error {
        dv.set_show_error_message(true);
        dv.set_error_message(error.clone());
    }
    dvs.add_data_validation_list(dv);
    Ok(())
}

#[async_trait]
impl DocumentPort for XlsxDocument {
    async fn read_grid(&self, range: &RangeAddress) -> PortResult<Matrix> {
        let (start_row, start_col, end_row, end_col) = range.bounds();
        self.with_sheet(|sheet| {
            (start_row..=end_row)
                .map(|row| {
                    (start_col..=end_col)
                        .map(|col| read_value(sheet, &CellAddress { col, row }))
                        .collect()
                })
                .collect()
        })
    }

    async fn write_cell(&self, address: &CellAddress, value: &Cell) -> PortResult<()> {
        self.with_sheet_mut(|sheet| {
            write_value(sheet, address, value);
            Ok(())
        })
    }

    async fn write_range(&self, range: &RangeAddress, values: &Matrix) -> PortResult<()> {
        if values.len() != range.rows() || values.iter().any(|row| row.len() != range.cols()) {
            return Err(PortError::host(format!(
                "values do not match the shape of {range}"
            )));
        }
        self.with_sheet_mut(|sheet| {
            for (address, value) in range.cells().zip(values.iter().flatten()) {
                write_value(sheet, &address, value);
            }
            Ok(())
        })
    }

    async fn selection(&self) -> PortResult<RangeAddress> {
        Ok(*self.selection.read())
    }

    async fn worksheet_name(&self) -> PortResult<String> {
        Ok(self.active.read().clone())
    }

    async fn used_range(&self) -> PortResult<Option<RangeAddress>> {
        self.with_sheet(|sheet| {
            let mut bounds: Option<(u32, u32, u32, u32)> = None;
            for cell in sheet.get_cell_collection() {
                if cell.get_value().is_empty() && !cell.is_formula() {
                    continue;
                }
                let col = *cell.get_coordinate().get_col_num();
                let row = *cell.get_coordinate().get_row_num();
                bounds = Some(match bounds {
                    None => (row, col, row, col),
                    Some((r0, c0, r1, c1)) => (r0.min(row), c0.min(col), r1.max(row), c1.max(col)),
                });
            }
            bounds.map(|(r0, c0, r1, c1)| {
                RangeAddress::new(
                    CellAddress { col: c0, row: r0 },
                    CellAddress { col: c1, row: r1 },
                )
            })
        })
    }

    async fn write_formula(&self, address: &CellAddress, formula: &str) -> PortResult<()> {
        self.with_sheet_mut(|sheet| {
            let cell = sheet.get_cell_mut(address.to_string().as_str());
            cell.set_formula(formula.to_string());
            cell.get_cell_value_mut()
                .set_formula_result_default(String::new());
            Ok(())
        })
    }

    async fn apply_format(&self, range: &RangeAddress, format: &FormattingSpec) -> PortResult<()> {
        self.with_sheet_mut(|sheet| {
            for address in range.cells() {
                apply_style(sheet.get_style_mut(address.to_string().as_str()), format);
            }
            Ok(())
        })
    }

    async fn create_worksheet(&self, name: &str) -> PortResult<()> {
        let mut book = self.book.lock();
        if Self::sheet_position(&book, name).is_some() {
            return Err(PortError::SheetExists(name.to_string()));
        }
        book.new_sheet(name.to_string())
            .map_err(|e| PortError::host(format!("failed to create sheet '{name}': {e}")))?;
        Ok(())
    }

    async fn delete_worksheet(&self, name: &str) -> PortResult<()> {
        let mut book = self.book.lock();
        let idx = Self::sheet_position(&book, name)
            .ok_or_else(|| PortError::SheetNotFound(name.to_string()))?;
        if book.get_sheet_collection_no_check().len() <= 1 {
            return Err(PortError::host("cannot delete the last remaining sheet"));
        }
        let actual = book.get_sheet_collection_no_check()[idx].get_name().to_string();
        book.remove_sheet_by_name(&actual)
            .map_err(|e| PortError::host(format!("failed to delete sheet '{name}': {e}")))?;

        let mut active = self.active.write();
        if active.eq_ignore_ascii_case(&actual) {
            *active = book
                .get_sheet_collection_no_check()
                .first()
                .map(|s| s.get_name().to_string())
                .unwrap_or_default();
        }
        Ok(())
    }

    async fn rename_worksheet(&self, from: &str, to: &str) -> PortResult<()> {
        let mut book = self.book.lock();
        let idx = Self::sheet_position(&book, from)
            .ok_or_else(|| PortError::SheetNotFound(from.to_string()))?;
        if let Some(existing) = Self::sheet_position(&book, to)
            && existing != idx
        {
            return Err(PortError::SheetExists(to.to_string()));
        }
        book.set_sheet_name(idx, to.to_string())
            .map_err(|e| PortError::host(format!("failed to rename sheet '{from}': {e}")))?;

        let mut active = self.active.write();
        if active.eq_ignore_ascii_case(from) {
            *active = to.to_string();
        }
        Ok(())
    }

    async fn apply_filter(&self, filter: &ApplyFilterPayload) -> PortResult<()> {
        if !filter.criteria.is_empty() {
            return Err(PortError::unsupported("filter criteria"));
        }
        self.with_sheet_mut(|sheet| {
            sheet.set_auto_filter(filter.address.to_string());
            Ok(())
        })
    }

    async fn apply_conditional_formatting(
        &self,
        rule: &ConditionalFormattingPayload,
    ) -> PortResult<()> {
        self.with_sheet_mut(|sheet| {
            append_conditional_format(sheet, rule);
            Ok(())
        })
    }

    async fn apply_data_validation(&self, rule: &DataValidationPayload) -> PortResult<()> {
        self.with_sheet_mut(|sheet| set_data_validation(sheet, rule))
    }

    async fn save_hint(&self) -> PortResult<()> {
        let book = Arc::clone(&self.book);
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let guard = book.lock();
            umya_spreadsheet::writer::xlsx::write(&guard, &path)
                .map_err(|e| PortError::host(format!("failed to save '{}': {e}", path.display())))
        })
        .await
        .map_err(|e| PortError::host(format!("save task failed: {e}")))?
    }

    fn name(&self) -> &'static str {
        "xlsx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_text_becomes_numbers() {
        assert_eq!(number_from_text("42"), Some(serde_json::json!(42)));
        assert_eq!(number_from_text("2.5"), Some(serde_json::json!(2.5)));
        assert_eq!(number_from_text("0.5"), Some(serde_json::json!(0.5)));
        assert_eq!(number_from_text("007"), None);
        assert_eq!(number_from_text("abc"), None);
    }
}
