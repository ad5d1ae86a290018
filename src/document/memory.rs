use crate::address::{CellAddress, RangeAddress};
use crate::errors::PortError;
use crate::port::{Cell, DocumentPort, Matrix, PortResult};
use crate::protocol::FormattingSpec;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// JSON accepted by `--grid`: a bare matrix, or named sheets.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GridSeed {
    Rows(Matrix),
    Workbook {
        sheets: Vec<SheetSeed>,
        #[serde(default)]
        selection: Option<RangeAddress>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetSeed {
    pub name: String,
    #[serde(default)]
    pub rows: Matrix,
}

#[derive(Debug, Clone, Default)]
struct Sheet {
    name: String,
    cells: BTreeMap<CellAddress, Cell>,
    formats: BTreeMap<CellAddress, FormattingSpec>,
}

impl Sheet {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn set(&mut self, address: CellAddress, value: &Cell) {
        if value.is_null() {
            self.cells.remove(&address);
        } else {
            self.cells.insert(address, value.clone());
        }
    }

    fn load_rows(&mut self, rows: &Matrix) -> PortResult<()> {
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let address = CellAddress::new(c as u32 + 1, r as u32 + 1)?;
                self.set(address, value);
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct State {
    sheets: Vec<Sheet>,
    active: usize,
    selection: RangeAddress,
}

impl State {
    fn position(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|sheet| sheet.name.eq_ignore_ascii_case(name))
    }

    fn active(&self) -> &Sheet {
        &self.sheets[self.active]
    }

    fn active_mut(&mut self) -> &mut Sheet {
        &mut self.sheets[self.active]
    }
}

/// In-memory workbook. Supports cells, formulas, formatting and worksheet
/// management; charts, pivots, filters and rules are left to the host.
#[derive(Debug)]
pub struct MemoryDocument {
    state: RwLock<State>,
    saves: AtomicUsize,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                sheets: vec![Sheet::named(DEFAULT_SHEET_NAME)],
                active: 0,
                selection: RangeAddress::single(CellAddress { col: 1, row: 1 }),
            }),
            saves: AtomicUsize::new(0),
        }
    }

    /// Single sheet populated from A1.
    pub fn with_rows(rows: &Matrix) -> PortResult<Self> {
        let doc = Self::new();
        doc.state.write().active_mut().load_rows(rows)?;
        Ok(doc)
    }

    pub fn from_seed(seed: &GridSeed) -> PortResult<Self> {
        match seed {
            GridSeed::Rows(rows) => Self::with_rows(rows),
            GridSeed::Workbook { sheets, selection } => {
                let mut built: Vec<Sheet> = Vec::with_capacity(sheets.len());
                for seed in sheets {
                    if built.iter().any(|s| s.name.eq_ignore_ascii_case(&seed.name)) {
                        return Err(PortError::SheetExists(seed.name.clone()));
                    }
                    let mut sheet = Sheet::named(&seed.name);
                    sheet.load_rows(&seed.rows)?;
                    built.push(sheet);
                }
                if built.is_empty() {
                    built.push(Sheet::named(DEFAULT_SHEET_NAME));
                }
                let doc = Self::new();
                {
                    let mut state = doc.state.write();
                    state.sheets = built;
                    if let Some(selection) = selection {
                        state.selection = *selection;
                    }
                }
                Ok(doc)
            }
        }
    }

    pub fn set_selection(&self, range: RangeAddress) {
        self.state.write().selection = range;
    }

    pub fn activate(&self, name: &str) -> PortResult<()> {
        let mut state = self.state.write();
        let idx = state
            .position(name)
            .ok_or_else(|| PortError::SheetNotFound(name.to_string()))?;
        state.active = idx;
        Ok(())
    }

    pub fn value_at(&self, address: &str) -> Option<Cell> {
        let address = CellAddress::parse(address).ok()?;
        self.state.read().active().cells.get(&address).cloned()
    }

    pub fn format_at(&self, address: &str) -> Option<FormattingSpec> {
        let address = CellAddress::parse(address).ok()?;
        self.state.read().active().formats.get(&address).cloned()
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.state
            .read()
            .sheets
            .iter()
            .map(|sheet| sheet.name.clone())
            .collect()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn clear(&self, range: &RangeAddress) -> usize {
        let mut state = self.state.write();
        let sheet = state.active_mut();
        let before = sheet.cells.len();
        sheet.cells.retain(|addr, _| !range.contains(addr));
        before - sheet.cells.len()
    }
}

fn address_param(params: &Value) -> PortResult<RangeAddress> {
    let raw = params
        .get("address")
        .and_then(Value::as_str)
        .ok_or_else(|| PortError::host("params.address is required"))?;
    Ok(RangeAddress::parse(raw)?)
}

#[async_trait]
impl DocumentPort for MemoryDocument {
    async fn read_grid(&self, range: &RangeAddress) -> PortResult<Matrix> {
        let state = self.state.read();
        let sheet = state.active();
        let (start_row, start_col, end_row, end_col) = range.bounds();
        Ok((start_row..=end_row)
            .map(|row| {
                (start_col..=end_col)
                    .map(|col| {
                        sheet
                            .cells
                            .get(&CellAddress { col, row })
                            .cloned()
                            .unwrap_or(Value::Null)
                    })
                    .collect()
            })
            .collect())
    }

    async fn write_cell(&self, address: &CellAddress, value: &Cell) -> PortResult<()> {
        self.state.write().active_mut().set(*address, value);
        Ok(())
    }

    async fn write_range(&self, range: &RangeAddress, values: &Matrix) -> PortResult<()> {
        if values.len() != range.rows() || values.iter().any(|row| row.len() != range.cols()) {
            return Err(PortError::host(format!(
                "values do not match the shape of {range}"
            )));
        }
        let mut state = self.state.write();
        let sheet = state.active_mut();
        for (address, value) in range.cells().zip(values.iter().flatten()) {
            sheet.set(address, value);
        }
        Ok(())
    }

    async fn selection(&self) -> PortResult<RangeAddress> {
        Ok(self.state.read().selection)
    }

    async fn worksheet_name(&self) -> PortResult<String> {
        Ok(self.state.read().active().name.clone())
    }

    async fn used_range(&self) -> PortResult<Option<RangeAddress>> {
        let state = self.state.read();
        let cells = &state.active().cells;
        let mut keys = cells.keys();
        let Some(first) = keys.next() else {
            return Ok(None);
        };
        let (mut min, mut max) = (*first, *first);
        for addr in keys {
            min.col = min.col.min(addr.col);
            min.row = min.row.min(addr.row);
            max.col = max.col.max(addr.col);
            max.row = max.row.max(addr.row);
        }
        Ok(Some(RangeAddress::new(min, max)))
    }

    async fn apply_format(&self, range: &RangeAddress, format: &FormattingSpec) -> PortResult<()> {
        let mut state = self.state.write();
        let sheet = state.active_mut();
        for address in range.cells() {
            sheet
                .formats
                .entry(address)
                .or_default()
                .merge(format);
        }
        Ok(())
    }

    async fn create_worksheet(&self, name: &str) -> PortResult<()> {
        let mut state = self.state.write();
        if state.position(name).is_some() {
            return Err(PortError::SheetExists(name.to_string()));
        }
        state.sheets.push(Sheet::named(name));
        Ok(())
    }

    async fn delete_worksheet(&self, name: &str) -> PortResult<()> {
        let mut state = self.state.write();
        let idx = state
            .position(name)
            .ok_or_else(|| PortError::SheetNotFound(name.to_string()))?;
        if state.sheets.len() == 1 {
            return Err(PortError::host("cannot delete the only worksheet"));
        }
        state.sheets.remove(idx);
        if state.active >= idx && state.active > 0 {
            state.active -= 1;
        }
        Ok(())
    }

    async fn rename_worksheet(&self, from: &str, to: &str) -> PortResult<()> {
        let mut state = self.state.write();
        let idx = state
            .position(from)
            .ok_or_else(|| PortError::SheetNotFound(from.to_string()))?;
        if let Some(existing) = state.position(to)
            && existing != idx
        {
            return Err(PortError::SheetExists(to.to_string()));
        }
        state.sheets[idx].name = to.to_string();
        Ok(())
    }

    async fn custom(&self, operation: &str, params: &Value) -> PortResult<Value> {
        match operation {
            "select" => {
                let range = address_param(params)?;
                self.set_selection(range);
                Ok(json!({ "selection": range.to_string() }))
            }
            "clear" => {
                let range = address_param(params)?;
                let cleared = self.clear(&range);
                Ok(json!({ "cleared": cleared }))
            }
            other => Err(PortError::host(format!(
                "unknown custom operation '{other}' (expected select|clear)"
            ))),
        }
    }

    async fn save_hint(&self) -> PortResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FontSpec;

    fn range(s: &str) -> RangeAddress {
        RangeAddress::parse(s).unwrap()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn reads_pad_missing_cells_with_null() {
        let doc = MemoryDocument::with_rows(&vec![vec![json!("a"), json!(1)]]).unwrap();
        let grid = doc.read_grid(&range("A1:C2")).await.unwrap();
        assert_eq!(
            grid,
            vec![
                vec![json!("a"), json!(1), Value::Null],
                vec![Value::Null, Value::Null, Value::Null]
            ]
        );
        assert_eq!(doc.used_range().await.unwrap(), Some(range("A1:B1")));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn formats_merge_rather_than_replace() {
        let doc = MemoryDocument::new();
        let bold = FormattingSpec {
            font: Some(FontSpec {
                bold: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let currency = FormattingSpec {
            number_format: Some("$#,##0.00".to_string()),
            ..Default::default()
        };
        doc.apply_format(&range("A1:B1"), &bold).await.unwrap();
        doc.apply_format(&range("A1"), &currency).await.unwrap();

        let a1 = doc.format_at("A1").unwrap();
        assert_eq!(a1.font.unwrap().bold, Some(true));
        assert_eq!(a1.number_format.as_deref(), Some("$#,##0.00"));
        assert!(doc.format_at("B1").unwrap().number_format.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn worksheet_lifecycle() {
        let doc = MemoryDocument::new();
        doc.create_worksheet("Data").await.unwrap();
        assert_eq!(
            doc.create_worksheet("data").await.unwrap_err(),
            PortError::SheetExists("data".into())
        );
        doc.rename_worksheet("Data", "Archive").await.unwrap();
        assert_eq!(doc.sheet_names(), vec!["Sheet1", "Archive"]);
        doc.delete_worksheet("Sheet1").await.unwrap();
        assert_eq!(doc.worksheet_name().await.unwrap(), "Archive");
        assert!(doc.delete_worksheet("Archive").await.is_err());
    }

    #[test]
    fn seeds_named_sheets() {
        let seed: GridSeed = serde_json::from_value(json!({
            "sheets": [{"name": "Sales", "rows": [["Region", "Total"]]}],
            "selection": "A1:B1"
        }))
        .unwrap();
        let doc = MemoryDocument::from_seed(&seed).unwrap();
        assert_eq!(doc.sheet_names(), vec!["Sales"]);
        assert_eq!(doc.value_at("B1"), Some(json!("Total")));
    }
}
