use crate::address::RangeAddress;
use crate::document::{GridSeed, MemoryDocument};
use crate::formatter::DEFAULT_MAX_WIDTH;
use crate::port::DocumentPort;
use crate::protocol::{Aggregation, DEFAULT_MAX_READ_CELLS};
use crate::resolver::PivotDefaults;
use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_READ_RANGE: &str = "A1:Z100";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Workbook to open; takes precedence over `grid`.
    pub document: Option<PathBuf>,
    /// JSON seed for the in-memory document.
    pub grid: Option<PathBuf>,
    pub sheet: Option<String>,
    /// Overrides the document's own selection, which starts at A1.
    pub selection: Option<RangeAddress>,
    pub default_read_range: RangeAddress,
    /// Reads covering more cells than this are refused before touching the document.
    pub max_read_cells: usize,
    pub max_line_width: usize,
    pub autosave: bool,
    pub action_timeout: Option<Duration>,
    pub log_filter: String,
    /// Canned envelope returned for commands no local rule recognizes.
    pub backend_reply: Option<PathBuf>,
    pub pivot: PivotDefaults,
}

impl AppConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            document: cli_document,
            grid: cli_grid,
            sheet: cli_sheet,
            selection: cli_selection,
            default_read_range: cli_default_read_range,
            max_read_cells: cli_max_read_cells,
            max_line_width: cli_max_line_width,
            autosave: cli_autosave,
            action_timeout_ms: cli_action_timeout_ms,
            log_filter: cli_log_filter,
            backend_reply: cli_backend_reply,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            document: file_document,
            grid: file_grid,
            sheet: file_sheet,
            selection: file_selection,
            default_read_range: file_default_read_range,
            max_read_cells: file_max_read_cells,
            max_line_width: file_max_line_width,
            autosave: file_autosave,
            action_timeout_ms: file_action_timeout_ms,
            log_filter: file_log_filter,
            backend_reply: file_backend_reply,
            pivot: file_pivot,
        } = file_config;

        let selection = cli_selection
            .or(file_selection)
            .map(|raw| parse_range("selection", Some(&raw), ""))
            .transpose()?;
        let default_read_range = parse_range(
            "default_read_range",
            cli_default_read_range
                .or(file_default_read_range)
                .as_deref(),
            DEFAULT_READ_RANGE,
        )?;

        let max_read_cells = cli_max_read_cells
            .or(file_max_read_cells)
            .unwrap_or(DEFAULT_MAX_READ_CELLS);
        anyhow::ensure!(max_read_cells > 0, "max_read_cells must be greater than zero");
        anyhow::ensure!(
            default_read_range.cell_count() <= max_read_cells,
            "default_read_range {} covers more than max_read_cells ({})",
            default_read_range,
            max_read_cells
        );

        let max_line_width = cli_max_line_width
            .or(file_max_line_width)
            .unwrap_or(DEFAULT_MAX_WIDTH);
        anyhow::ensure!(max_line_width > 0, "max_line_width must be greater than zero");

        let action_timeout_ms = cli_action_timeout_ms
            .or(file_action_timeout_ms)
            .unwrap_or(0);
        let action_timeout = if action_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(action_timeout_ms))
        };

        let autosave = cli_autosave || file_autosave.unwrap_or(false);

        let log_filter = cli_log_filter
            .or(file_log_filter)
            .map(|filter| filter.trim().to_string())
            .filter(|filter| !filter.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let sheet = cli_sheet
            .or(file_sheet)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let pivot = file_pivot.unwrap_or_default().resolve()?;

        Ok(Self {
            document: cli_document.or(file_document),
            grid: cli_grid.or(file_grid),
            sheet,
            selection,
            default_read_range,
            max_read_cells,
            max_line_width,
            autosave,
            action_timeout,
            log_filter,
            backend_reply: cli_backend_reply.or(file_backend_reply),
            pivot,
        })
    }

    /// Opens the configured workbook, or builds an in-memory document.
    pub fn open_document(&self) -> Result<Arc<dyn DocumentPort>> {
        if let Some(path) = self.document.as_ref() {
            return self.open_workbook(path);
        }
        let document = match self.grid.as_ref() {
            Some(path) => {
                let seed = load_grid(path)?;
                MemoryDocument::from_seed(&seed)
                    .with_context(|| format!("grid {:?} is not a valid document", path))?
            }
            None => MemoryDocument::new(),
        };
        if let Some(sheet) = self.sheet.as_deref() {
            document.activate(sheet)?;
        }
        if let Some(selection) = self.selection {
            document.set_selection(selection);
        }
        Ok(Arc::new(document))
    }

    #[cfg(feature = "xlsx")]
    fn open_workbook(&self, path: &Path) -> Result<Arc<dyn DocumentPort>> {
        let document = crate::document::XlsxDocument::open(path, self.sheet.as_deref())?;
        if let Some(selection) = self.selection {
            document.set_selection(selection);
        }
        Ok(Arc::new(document))
    }

    #[cfg(not(feature = "xlsx"))]
    fn open_workbook(&self, path: &Path) -> Result<Arc<dyn DocumentPort>> {
        anyhow::bail!(
            "workbook {:?} cannot be opened: built without the xlsx feature",
            path
        )
    }
}

#[derive(Args, Debug, Default, Clone)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "SHEET_INTENT_DOCUMENT",
        value_name = "FILE",
        help = "xlsx workbook to act on (created on save if missing)",
        global = true
    )]
    pub document: Option<PathBuf>,

    #[arg(
        long,
        env = "SHEET_INTENT_GRID",
        value_name = "FILE",
        help = "JSON grid seeding the in-memory document",
        global = true
    )]
    pub grid: Option<PathBuf>,

    #[arg(
        long,
        env = "SHEET_INTENT_SHEET",
        value_name = "NAME",
        help = "Worksheet to make active",
        global = true
    )]
    pub sheet: Option<String>,

    #[arg(
        long,
        env = "SHEET_INTENT_SELECTION",
        value_name = "RANGE",
        help = "Current selection (default: A1)",
        global = true
    )]
    pub selection: Option<String>,

    #[arg(
        long,
        env = "SHEET_INTENT_DEFAULT_READ_RANGE",
        value_name = "RANGE",
        help = "Range read when a query names none and the sheet has no used range (default: A1:Z100)",
        global = true
    )]
    pub default_read_range: Option<String>,

    #[arg(
        long,
        env = "SHEET_INTENT_MAX_READ_CELLS",
        value_name = "N",
        help = "Largest number of cells a single read may cover (default: 10000)",
        value_parser = clap::value_parser!(usize),
        global = true
    )]
    pub max_read_cells: Option<usize>,

    #[arg(
        long,
        env = "SHEET_INTENT_MAX_LINE_WIDTH",
        value_name = "N",
        help = "Maximum width of formatted lines (default: 120)",
        value_parser = clap::value_parser!(usize),
        global = true
    )]
    pub max_line_width: Option<usize>,

    #[arg(
        long,
        env = "SHEET_INTENT_AUTOSAVE",
        help = "Save the document after a batch that changed it",
        global = true
    )]
    pub autosave: bool,

    #[arg(
        long,
        env = "SHEET_INTENT_ACTION_TIMEOUT_MS",
        value_name = "MS",
        help = "Per-action timeout in milliseconds (default: 0, disabled)",
        value_parser = clap::value_parser!(u64),
        global = true
    )]
    pub action_timeout_ms: Option<u64>,

    #[arg(
        long,
        env = "SHEET_INTENT_LOG",
        value_name = "FILTER",
        help = "tracing filter used when RUST_LOG is unset (default: warn)",
        global = true
    )]
    pub log_filter: Option<String>,

    #[arg(
        long,
        env = "SHEET_INTENT_BACKEND_REPLY",
        value_name = "FILE",
        help = "Envelope returned for commands the local rules do not recognize",
        global = true
    )]
    pub backend_reply: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    document: Option<PathBuf>,
    grid: Option<PathBuf>,
    sheet: Option<String>,
    selection: Option<String>,
    default_read_range: Option<String>,
    max_read_cells: Option<usize>,
    max_line_width: Option<usize>,
    autosave: Option<bool>,
    action_timeout_ms: Option<u64>,
    log_filter: Option<String>,
    backend_reply: Option<PathBuf>,
    pivot: Option<PartialPivot>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialPivot {
    source: Option<String>,
    destination: Option<String>,
    row_field: Option<String>,
    column_field: Option<String>,
    value_field: Option<String>,
    aggregation: Option<String>,
}

impl PartialPivot {
    fn resolve(self) -> Result<PivotDefaults> {
        let defaults = PivotDefaults::default();
        let source = match self.source.as_deref() {
            Some(raw) => parse_range("pivot.source", Some(raw), "")?,
            None => defaults.source,
        };
        let destination = match self.destination.as_deref() {
            Some(raw) => parse_range("pivot.destination", Some(raw), "")?,
            None => defaults.destination,
        };
        let aggregation = match self.aggregation.as_deref() {
            Some(raw) => Aggregation::parse(raw)
                .with_context(|| format!("pivot.aggregation '{raw}' is not a known aggregation"))?,
            None => defaults.aggregation,
        };
        Ok(PivotDefaults {
            source,
            destination,
            row_field: field_or(self.row_field, defaults.row_field),
            column_field: field_or(self.column_field, defaults.column_field),
            value_field: field_or(self.value_field, defaults.value_field),
            aggregation,
        })
    }
}

fn field_or(value: Option<String>, default: String) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn parse_range(field: &str, raw: Option<&str>, default: &str) -> Result<RangeAddress> {
    let raw = raw.unwrap_or(default);
    RangeAddress::parse(raw.trim()).with_context(|| format!("{field} '{raw}' is not a valid range"))
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    let contents = read_source("config", path)?;
    match extension(path).as_str() {
        "yaml" | "yml" => parse_yaml("config", path, &contents),
        "json" => parse_json("config", path, &contents),
        other => anyhow::bail!("unsupported config extension: {other}"),
    }
}

/// Grid seeds are JSON unless the file says YAML.
pub fn load_grid(path: &Path) -> Result<GridSeed> {
    let contents = read_source("grid", path)?;
    match extension(path).as_str() {
        "yaml" | "yml" => parse_yaml("grid", path, &contents),
        _ => parse_json("grid", path, &contents),
    }
}

fn read_source(what: &str, path: &Path) -> Result<String> {
    anyhow::ensure!(path.exists(), "{what} file {:?} does not exist", path);
    fs::read_to_string(path).with_context(|| format!("failed to read {what} file {:?}", path))
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

fn parse_yaml<T: DeserializeOwned>(what: &str, path: &Path, contents: &str) -> Result<T> {
    serde_yaml::from_str(contents)
        .with_context(|| format!("failed to parse {what} {:?} as YAML", path))
}

fn parse_json<T: DeserializeOwned>(what: &str, path: &Path, contents: &str) -> Result<T> {
    serde_json::from_str(contents)
        .with_context(|| format!("failed to parse {what} {:?} as JSON", path))
}
