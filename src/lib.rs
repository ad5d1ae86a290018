//! Free-text spreadsheet commands turned into typed, validated actions and
//! applied to a document through [`port::DocumentPort`].

pub mod address;
pub mod backend;
pub mod cli;
pub mod config;
pub mod document;
pub mod errors;
pub mod executor;
pub mod formatter;
pub mod port;
pub mod protocol;
pub mod resolver;
pub mod service;

pub use address::{CellAddress, RangeAddress};
pub use backend::{BackendRequest, FileBackend, ReasoningBackend};
pub use config::{AppConfig, CliArgs};
pub use document::MemoryDocument;
#[cfg(feature = "xlsx")]
pub use document::XlsxDocument;
pub use errors::{ErrorCode, ErrorInfo, PortError, ValidationError};
pub use executor::ActionExecutor;
pub use formatter::OutputFormatter;
pub use port::{Cell, DocumentPort, Matrix};
pub use protocol::{
    Action, ActionKind, ActionOp, ExecutionOutcome, IncomingEnvelope, RawAction,
    ResponseEnvelope,
};
pub use resolver::{IntentResolver, Resolution};
pub use service::CommandService;
