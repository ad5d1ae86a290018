use crate::address::{CellAddress, column_letters};
use crate::port::Cell;
use serde_json::{Map, Value};

pub const EMPTY_SHEET: &str = "The worksheet is empty.";
pub const DEFAULT_MAX_WIDTH: usize = 120;
const CONTINUATION_INDENT: &str = "  ";

/// Renders a grid as `Row N: A1=x, C1=y` lines capped at `max_width` characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormatter {
    max_width: usize,
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WIDTH)
    }
}

impl OutputFormatter {
    pub fn new(max_width: usize) -> Self {
        Self {
            max_width: max_width.max(1),
        }
    }

    pub fn max_width(&self) -> usize {
        self.max_width
    }

    /// Grid whose first cell is A1.
    pub fn format(&self, grid: &[Vec<Cell>]) -> String {
        self.format_at(grid, CellAddress { col: 1, row: 1 })
    }

    /// Grid whose first cell sits at `origin`.
    pub fn format_at(&self, grid: &[Vec<Cell>], origin: CellAddress) -> String {
        let mut out = LineBuilder::new(self.max_width);
        for (r, row) in grid.iter().enumerate() {
            let row_num = origin.row as usize + r;
            let mut entries = row.iter().enumerate().filter_map(|(c, value)| {
                let text = render_cell(value)?;
                let col = column_letters(origin.col - 1 + c as u32);
                Some(format!("{col}{row_num}={text}"))
            });
            let Some(first) = entries.next() else {
                continue;
            };
            out.start(format!("Row {row_num}: "));
            out.push_entry(&first);
            for entry in entries {
                out.push_entry(&entry);
            }
            out.flush();
        }
        if out.lines.is_empty() {
            EMPTY_SHEET.to_string()
        } else {
            out.lines.join("\n")
        }
    }
}

/// `None` for cells that should not be listed.
pub fn render_cell(value: &Cell) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(single_line(s)),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        structured => Some(sorted(structured).to_string()),
    }
}

/// Line breaks inside a cell would start a new output row.
fn single_line(s: &str) -> String {
    if !s.contains(['\n', '\r']) {
        return s.to_string();
    }
    s.lines().collect::<Vec<_>>().join(" ").replace('\r', " ")
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&map[key.as_str()]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

fn width(s: &str) -> usize {
    s.chars().count()
}

struct LineBuilder {
    max_width: usize,
    lines: Vec<String>,
    current: String,
    /// Width of the prefix or indent at the start of `current`.
    lead: usize,
    entries_on_line: usize,
}

impl LineBuilder {
    fn new(max_width: usize) -> Self {
        Self {
            max_width,
            lines: Vec::new(),
            current: String::new(),
            lead: 0,
            entries_on_line: 0,
        }
    }

    fn start(&mut self, prefix: String) {
        self.lead = width(&prefix);
        self.current = prefix;
        self.entries_on_line = 0;
    }

    fn flush(&mut self) {
        if width(&self.current) > self.lead {
            self.lines.push(std::mem::take(&mut self.current));
        }
        self.current.clear();
        self.entries_on_line = 0;
    }

    fn continue_line(&mut self) {
        self.flush();
        self.start(CONTINUATION_INDENT.to_string());
    }

    fn push_entry(&mut self, entry: &str) {
        let sep = if self.entries_on_line > 0 { ", " } else { "" };
        if width(&self.current) + width(sep) + width(entry) <= self.max_width {
            self.current.push_str(sep);
            self.current.push_str(entry);
            self.entries_on_line += 1;
            return;
        }
        if self.entries_on_line > 0 {
            self.continue_line();
            if width(&self.current) + width(entry) <= self.max_width {
                self.current.push_str(entry);
                self.entries_on_line += 1;
                return;
            }
        }
        self.push_wrapped(entry);
    }

    /// Splits at spaces only; a single word wider than the cap gets its own line.
    fn push_wrapped(&mut self, entry: &str) {
        let mut at_line_start = width(&self.current) == self.lead;
        for word in entry.split(' ').filter(|w| !w.is_empty()) {
            let sep = if at_line_start { 0 } else { 1 };
            if !at_line_start && width(&self.current) + sep + width(word) > self.max_width {
                self.continue_line();
                at_line_start = true;
            }
            if !at_line_start {
                self.current.push(' ');
            }
            self.current.push_str(word);
            at_line_start = false;
        }
        self.entries_on_line += 1;
    }
}
