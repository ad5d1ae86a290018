use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("invalid cell address '{0}' (expected like 'A1')")]
    InvalidCell(String),
    #[error("invalid range address '{0}' (expected like 'A1' or 'A1:B5')")]
    InvalidRange(String),
    #[error("address '{0}' is outside the sheet bounds (max XFD1048576)")]
    OutOfBounds(String),
}

/// Rejection of a structurally malformed action before it reaches a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("action kind is required")]
    MissingKind,
    #[error("unknown action kind '{0}'")]
    UnknownKind(String),
    #[error("{kind}: missing required field '{field}'")]
    MissingField { kind: &'static str, field: &'static str },
    #[error("{kind}: invalid field '{field}': {message}")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
        message: String,
    },
    #[error("{kind}: values row {row} has {found} cells, expected {expected} (matrix must be rectangular)")]
    JaggedMatrix {
        kind: &'static str,
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error(
        "{kind}: values are {rows}x{cols} but {address} spans {expected_rows}x{expected_cols}"
    )]
    DimensionMismatch {
        kind: &'static str,
        address: String,
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },
    #[error("{kind}: {address} covers {cells} cells, more than the limit of {max}")]
    RangeTooLarge {
        kind: &'static str,
        address: String,
        cells: usize,
        max: usize,
    },
}

impl ValidationError {
    pub(crate) fn invalid(
        kind: &'static str,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            kind,
            field,
            message: message.into(),
        }
    }
}

/// Failure reported by a [`crate::port::DocumentPort`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("{operation} is not supported by this document")]
    Unsupported { operation: &'static str },
    #[error("worksheet '{0}' not found")]
    SheetNotFound(String),
    #[error("worksheet '{0}' already exists")]
    SheetExists(String),
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),
    #[error("{0}")]
    Host(String),
}

impl PortError {
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Malformed literal syntax inside a free-text command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not parse {what}: {message}")]
pub struct FormatError {
    what: &'static str,
    message: String,
}

impl FormatError {
    pub fn new(what: &'static str, message: impl Into<String>) -> Self {
        Self {
            what,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationFailed,
    DocumentError,
    Unsupported,
    Timeout,
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&ValidationError> for ErrorInfo {
    fn from(err: &ValidationError) -> Self {
        Self::new(ErrorCode::ValidationFailed, err.to_string())
    }
}

impl From<&PortError> for ErrorInfo {
    fn from(err: &PortError) -> Self {
        let code = if err.is_unsupported() {
            ErrorCode::Unsupported
        } else {
            ErrorCode::DocumentError
        };
        Self::new(code, err.to_string())
    }
}
