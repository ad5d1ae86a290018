use crate::backend::{BackendRequest, FileBackend, ReasoningBackend};
use crate::config::AppConfig;
use crate::errors::{ErrorCode, ErrorInfo};
use crate::executor::ActionExecutor;
use crate::formatter::OutputFormatter;
use crate::port::DocumentPort;
use crate::protocol::{
    Effect, ExecutionOutcome, IncomingEnvelope, RawAction, ResponseEnvelope, ResponseMetadata,
};
use crate::resolver::{IntentResolver, LocalResponse, Resolution};
use std::sync::Arc;
use tracing::{info, warn};

/// Caller-facing entry point: one command in, one envelope out.
pub struct CommandService {
    document: Arc<dyn DocumentPort>,
    resolver: IntentResolver,
    executor: ActionExecutor,
    backend: Option<Arc<dyn ReasoningBackend>>,
}

impl CommandService {
    pub fn new(document: Arc<dyn DocumentPort>) -> Self {
        Self {
            resolver: IntentResolver::new(document.clone()),
            executor: ActionExecutor::new(document.clone()),
            document,
            backend: None,
        }
    }

    pub fn from_config(document: Arc<dyn DocumentPort>, config: &AppConfig) -> Self {
        let resolver = IntentResolver::new(document.clone())
            .with_formatter(OutputFormatter::new(config.max_line_width))
            .with_pivot_defaults(config.pivot.clone())
            .with_default_read_range(config.default_read_range)
            .with_max_read_cells(config.max_read_cells);
        let executor = ActionExecutor::new(document.clone())
            .with_save_after_write(config.autosave)
            .with_action_timeout(config.action_timeout)
            .with_max_read_cells(config.max_read_cells);
        let backend = config
            .backend_reply
            .as_ref()
            .map(|path| Arc::new(FileBackend::new(path)) as Arc<dyn ReasoningBackend>);
        Self {
            document,
            resolver,
            executor,
            backend,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn ReasoningBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn resolver(&self) -> &IntentResolver {
        &self.resolver
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    pub async fn resolve_and_respond(&self, text: &str) -> ResponseEnvelope {
        match self.resolver.resolve(text).await {
            Resolution::Local(local) => local_envelope(local),
            Resolution::Actions(batch) => {
                let outcomes = self.executor.execute_all(&batch.actions).await;
                let actions = batch.actions.iter().map(RawAction::from).collect();
                respond(batch.message, None, actions, outcomes)
            }
            Resolution::Unrecognized(fallback) => match &self.backend {
                Some(backend) => self.ask_backend(backend.as_ref(), text, fallback).await,
                None => local_envelope(fallback),
            },
        }
    }

    /// Validates and runs actions produced elsewhere, typically by a backend.
    pub async fn execute_envelope(&self, envelope: IncomingEnvelope) -> ResponseEnvelope {
        let outcomes = self.executor.execute_raw(&envelope.actions).await;
        let message = if envelope.message.trim().is_empty() {
            let applied = outcomes.iter().filter(|o| o.ok()).count();
            format!("Applied {applied} of {} actions", outcomes.len())
        } else {
            envelope.message
        };
        respond(message, envelope.body, envelope.actions, outcomes)
    }

    async fn ask_backend(
        &self,
        backend: &dyn ReasoningBackend,
        text: &str,
        fallback: LocalResponse,
    ) -> ResponseEnvelope {
        let request = match self.backend_request(text).await {
            Ok(request) => request,
            Err(error) => {
                warn!(error = %error.message, "could not describe the document to the backend");
                return ResponseEnvelope::failed(fallback.message, vec![error]);
            }
        };
        info!(backend = backend.name(), "forwarding unrecognized command");
        match backend.respond(&request).await {
            Ok(envelope) => self.execute_envelope(envelope).await,
            Err(err) => {
                warn!(backend = backend.name(), error = %err, "backend failed");
                ResponseEnvelope::failed(
                    fallback.message,
                    vec![ErrorInfo::new(
                        ErrorCode::Unrecognized,
                        format!("backend '{}' failed: {err:#}", backend.name()),
                    )],
                )
            }
        }
    }

    async fn backend_request(&self, text: &str) -> Result<BackendRequest, ErrorInfo> {
        let worksheet = self
            .document
            .worksheet_name()
            .await
            .map_err(|err| ErrorInfo::from(&err))?;
        let selection = self
            .document
            .selection()
            .await
            .map_err(|err| ErrorInfo::from(&err))?;
        Ok(BackendRequest {
            text: text.to_string(),
            worksheet,
            selection,
        })
    }
}

fn local_envelope(local: LocalResponse) -> ResponseEnvelope {
    let LocalResponse {
        message,
        body,
        error,
    } = local;
    let metadata = ResponseMetadata::from_errors(error.into_iter().collect());
    ResponseEnvelope {
        body,
        metadata: Some(metadata),
        ..ResponseEnvelope::new(message)
    }
}

fn respond(
    message: String,
    body: Option<String>,
    actions: Vec<RawAction>,
    outcomes: Vec<ExecutionOutcome>,
) -> ResponseEnvelope {
    let errors: Vec<ErrorInfo> = outcomes.iter().filter_map(|o| o.error().cloned()).collect();
    let report = outcome_report(&outcomes);
    let body = match (body, report) {
        (Some(body), Some(report)) => Some(format!("{body}\n\n{report}")),
        (body, report) => body.or(report),
    };
    ResponseEnvelope {
        body,
        actions,
        metadata: Some(ResponseMetadata::from_errors(errors)),
        outcomes,
        ..ResponseEnvelope::new(message)
    }
}

/// One line per outcome, with notes and manual steps indented beneath it.
pub fn outcome_report(outcomes: &[ExecutionOutcome]) -> Option<String> {
    if outcomes.is_empty() {
        return None;
    }
    let mut lines = Vec::new();
    for outcome in outcomes {
        let status = if outcome.ok() { "ok" } else { "failed" };
        lines.push(format!(
            "{}. [{status}] {}",
            outcome.index() + 1,
            outcome.action().kind
        ));
        if let Some(error) = outcome.error() {
            lines.push(format!("   error: {}", error.message));
        }
        for note in outcome.notes() {
            lines.push(format!("   note: {note}"));
        }
        if let Some(Effect::Acknowledged { instructions }) = outcome.effect() {
            lines.push(format!("   manual: {instructions}"));
        }
    }
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use serde_json::json;

    #[tokio::test(flavor = "current_thread")]
    async fn local_reads_keep_success() {
        let doc = Arc::new(MemoryDocument::with_rows(&vec![vec![json!("hi")]]).unwrap());
        let service = CommandService::new(doc);
        let envelope = service.resolve_and_respond("show A1:B2").await;
        assert!(envelope.success());
        assert!(envelope.actions.is_empty());
        assert_eq!(envelope.body.as_deref(), Some("Row 1: A1=hi"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unrecognized_without_backend_fails_with_help() {
        let service = CommandService::new(Arc::new(MemoryDocument::new()));
        let envelope = service.resolve_and_respond("sing me a song").await;
        assert!(!envelope.success());
        let metadata = envelope.metadata.as_ref().unwrap();
        assert_eq!(metadata.errors()[0].code, ErrorCode::Unrecognized);
        assert!(envelope.body.unwrap().contains("Write value 42 to cell A1"));
    }

    #[test]
    fn report_lists_errors_and_notes() {
        let ok = ExecutionOutcome::succeeded(
            0,
            RawAction::new("insert-formula", json!({})),
            Effect::FormulaInserted {
                address: "A1".into(),
                formula: "=1".into(),
            },
            vec!["Stripped leading '=' from formula at A1".into()],
        );
        let failed = ExecutionOutcome::failed(
            1,
            RawAction::new("delete-worksheet", json!({})),
            ErrorInfo::new(ErrorCode::DocumentError, "worksheet 'X' not found"),
        );
        assert_eq!(
            outcome_report(&[ok, failed]).unwrap(),
            "1. [ok] insert-formula\n   note: Stripped leading '=' from formula at A1\n\
             2. [failed] delete-worksheet\n   error: worksheet 'X' not found"
        );
        assert_eq!(outcome_report(&[]), None);
    }
}
