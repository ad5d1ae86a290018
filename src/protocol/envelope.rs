use super::outcome::ExecutionOutcome;
use super::payload::Action;
use super::validate::validate;
use crate::errors::ErrorInfo;
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::borrow::Cow;

/// Wire form of an action, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawAction {
    #[serde(default, alias = "type")]
    pub kind: String,
    #[serde(default, alias = "data")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RawAction {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            description: None,
        }
    }
}

impl From<&Action> for RawAction {
    fn from(action: &Action) -> Self {
        Self {
            kind: action.kind().as_str().to_string(),
            payload: action.op.payload_value(),
            description: action.description.clone(),
        }
    }
}

impl TryFrom<&RawAction> for Action {
    type Error = crate::errors::ValidationError;

    fn try_from(raw: &RawAction) -> Result<Self, Self::Error> {
        validate(raw)
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawAction::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawAction::deserialize(deserializer)?;
        validate(&raw).map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for Action {
    fn schema_name() -> Cow<'static, str> {
        "Action".into()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        RawAction::json_schema(generator)
    }
}

/// `success` is false exactly when `errors` is present and non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseMetadata {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<ErrorInfo>>,
}

impl ResponseMetadata {
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: None,
        }
    }

    pub fn from_errors(errors: Vec<ErrorInfo>) -> Self {
        if errors.is_empty() {
            Self::ok()
        } else {
            Self {
                success: false,
                errors: Some(errors),
            }
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn errors(&self) -> &[ErrorInfo] {
        self.errors.as_deref().unwrap_or_default()
    }
}

/// What the caller gets back for one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseEnvelope {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub actions: Vec<RawAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outcomes: Vec<ExecutionOutcome>,
}

impl ResponseEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            body: None,
            actions: Vec::new(),
            metadata: Some(ResponseMetadata::ok()),
            outcomes: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn failed(message: impl Into<String>, errors: Vec<ErrorInfo>) -> Self {
        Self {
            metadata: Some(ResponseMetadata::from_errors(errors)),
            ..Self::new(message)
        }
    }

    pub fn success(&self) -> bool {
        self.metadata.as_ref().is_none_or(ResponseMetadata::success)
    }
}

/// Envelope produced by a reasoning backend. Actions stay raw until validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IncomingEnvelope {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub actions: Vec<RawAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl IncomingEnvelope {
    /// Accepts either a full envelope or a bare array of actions.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        match value {
            Value::Array(_) => Ok(Self {
                actions: serde_json::from_value(value)?,
                ..Default::default()
            }),
            other => serde_json::from_value(other),
        }
    }
}
