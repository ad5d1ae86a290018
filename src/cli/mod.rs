pub mod errors;
pub mod output;

use crate::address::CellAddress;
use crate::config::{AppConfig, CliArgs};
use crate::formatter::OutputFormatter;
use crate::port::Matrix;
use crate::protocol::{IncomingEnvelope, ResponseEnvelope};
use crate::service::CommandService;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(
    name = "sheet-intent",
    version,
    about = "Turn free-text spreadsheet commands into validated actions"
)]
pub struct Cli {
    #[command(flatten)]
    pub config: CliArgs,

    #[arg(long, global = true)]
    pub compact: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve a command and apply any actions it produces.
    Resolve {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Validate and apply an envelope or a bare array of actions.
    Execute { file: PathBuf },
    /// Render a JSON grid the way query replies are rendered.
    Format {
        file: PathBuf,
        #[arg(long, value_name = "CELL", default_value = "A1")]
        origin: String,
    },
    /// Print the JSON Schema of the envelope accepted by `execute`.
    Schema {
        #[arg(long)]
        response: bool,
    },
}

pub async fn run_command(command: Commands, config: &AppConfig) -> Result<Value> {
    match command {
        Commands::Resolve { text } => {
            let service = open_service(config)?;
            let envelope = service.resolve_and_respond(&text.join(" ")).await;
            warn_if_unsaved(config, &envelope);
            envelope_value(&envelope)
        }
        Commands::Execute { file } => {
            let incoming = IncomingEnvelope::from_value(read_json(&file)?)
                .with_context(|| format!("{:?} is not an envelope or action list", file))?;
            let service = open_service(config)?;
            let envelope = service.execute_envelope(incoming).await;
            warn_if_unsaved(config, &envelope);
            envelope_value(&envelope)
        }
        Commands::Format { file, origin } => {
            let grid: Matrix = serde_json::from_value(read_json(&file)?)
                .with_context(|| format!("{:?} is not a JSON grid", file))?;
            let origin = CellAddress::parse(&origin)
                .with_context(|| format!("origin '{origin}' is not a cell address"))?;
            let text = OutputFormatter::new(config.max_line_width).format_at(&grid, origin);
            Ok(json!({ "text": text }))
        }
        Commands::Schema { response } => {
            let schema = if response {
                schemars::schema_for!(ResponseEnvelope)
            } else {
                schemars::schema_for!(IncomingEnvelope)
            };
            Ok(serde_json::to_value(schema)?)
        }
    }
}

fn open_service(config: &AppConfig) -> Result<CommandService> {
    let document = config.open_document()?;
    tracing::debug!(document = document.name(), "document opened");
    Ok(CommandService::from_config(document, config))
}

/// Workbook edits live in memory until saved; without autosave they are
/// dropped when the process exits.
fn warn_if_unsaved(config: &AppConfig, envelope: &ResponseEnvelope) -> bool {
    let Some(path) = config.document.as_ref() else {
        return false;
    };
    let unsaved = !config.autosave
        && envelope
            .outcomes
            .iter()
            .any(crate::protocol::ExecutionOutcome::changed_document);
    if unsaved {
        tracing::warn!(
            document = %path.display(),
            "document changed but autosave is off; pass --autosave to keep the edits"
        );
    }
    unsaved
}

fn envelope_value(envelope: &ResponseEnvelope) -> Result<Value> {
    serde_json::to_value(envelope).context("failed to serialize response envelope")
}

fn read_json(path: &Path) -> Result<Value> {
    if !path.exists() {
        anyhow::bail!("input file {:?} does not exist", path);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input file {:?}", path))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse JSON input {:?}", path))
}
