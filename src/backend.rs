use crate::address::RangeAddress;
use crate::protocol::IncomingEnvelope;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What a backend is told about the command it has to answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendRequest {
    pub text: String,
    pub worksheet: String,
    pub selection: RangeAddress,
}

/// Answers commands the local rules do not recognize.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    async fn respond(&self, request: &BackendRequest) -> Result<IncomingEnvelope>;
    fn name(&self) -> &'static str;
}

/// Replies with an envelope read from a JSON file on every request.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReasoningBackend for FileBackend {
    async fn respond(&self, request: &BackendRequest) -> Result<IncomingEnvelope> {
        tracing::debug!(path = %self.path.display(), text = %request.text, "reading canned reply");
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read backend reply {:?}", self.path))?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("backend reply {:?} is not JSON", self.path))?;
        IncomingEnvelope::from_value(value)
            .with_context(|| format!("backend reply {:?} is not an envelope", self.path))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::CellAddress;
    use std::io::Write;

    fn request() -> BackendRequest {
        BackendRequest {
            text: "make it pretty".to_string(),
            worksheet: "Sheet1".to_string(),
            selection: RangeAddress::single(CellAddress { col: 1, row: 1 }),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn file_backend_reads_envelopes_and_bare_arrays() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"kind": "write-cell", "payload": {{"address": "A1", "value": 1}}}}]"#
        )
        .unwrap();
        let backend = FileBackend::new(file.path());
        let envelope = backend.respond(&request()).await.unwrap();
        assert_eq!(envelope.actions.len(), 1);
        assert_eq!(envelope.actions[0].kind, "write-cell");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_reply_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("nope.json"));
        let err = backend.respond(&request()).await.unwrap_err();
        assert!(err.to_string().contains("failed to read backend reply"));
    }
}
