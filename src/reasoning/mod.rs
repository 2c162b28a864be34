//! Reasoning capability
//!
//! The engine never talks to a model provider directly. Everything that needs
//! generated text or a structured object goes through the [`Reasoner`] trait:
//! a set of named values plus a task description in, text or a JSON object
//! out. Provider adapters live outside this crate; [`ScriptedReasoner`] is the
//! in-process implementation used by tests and the CLI replay mode.

mod scripted;

pub use scripted::ScriptedReasoner;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a reasoning capability
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("reasoning call failed: {0}")]
    Failed(String),

    #[error("unparseable response: {0}")]
    Unparseable(String),

    #[error("expected a {expected} response, got {got}")]
    UnexpectedKind {
        expected: &'static str,
        got: &'static str,
    },

    #[error("no scripted response left for task: {0}")]
    Exhausted(String),
}

/// Shape of the response a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Text,
    Object,
}

/// A single call to the reasoning capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningRequest {
    /// What the capability is asked to do
    pub task: String,
    /// Named values, in the order they were attached
    pub inputs: Vec<(String, serde_json::Value)>,
    /// Expected response shape
    pub response: ResponseKind,
}

impl ReasoningRequest {
    /// Request a free-form text answer
    pub fn text(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            inputs: Vec::new(),
            response: ResponseKind::Text,
        }
    }

    /// Request a structured (JSON object) answer
    pub fn object(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            inputs: Vec::new(),
            response: ResponseKind::Object,
        }
    }

    /// Attach a named value
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.inputs.push((name.into(), value.into()));
        self
    }

    /// Look up an attached value by name
    pub fn input(&self, name: &str) -> Option<&serde_json::Value> {
        self.inputs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// What the capability produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Generation {
    Text(String),
    Object(serde_json::Value),
}

impl Generation {
    fn kind(&self) -> &'static str {
        match self {
            Generation::Text(_) => "text",
            Generation::Object(_) => "object",
        }
    }
}

/// Turns named values plus a task into generated text or a structured object.
///
/// Implementations may be slow and may fail; the engine never retries.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Run one generation
    async fn generate(&self, request: &ReasoningRequest) -> Result<Generation, CapabilityError>;
}

/// Typed helpers over [`Reasoner::generate`]
#[async_trait]
pub trait ReasonerExt {
    /// Generate and return plain text
    async fn query_text(&self, request: ReasoningRequest) -> Result<String, CapabilityError>;

    /// Generate and deserialize a structured object
    async fn query_object<T>(&self, request: ReasoningRequest) -> Result<T, CapabilityError>
    where
        T: DeserializeOwned + Send;
}

#[async_trait]
impl<R: Reasoner + ?Sized> ReasonerExt for R {
    async fn query_text(&self, request: ReasoningRequest) -> Result<String, CapabilityError> {
        match self.generate(&request).await? {
            Generation::Text(text) => Ok(text),
            Generation::Object(serde_json::Value::String(text)) => Ok(text),
            other => Err(CapabilityError::UnexpectedKind {
                expected: "text",
                got: other.kind(),
            }),
        }
    }

    async fn query_object<T>(&self, request: ReasoningRequest) -> Result<T, CapabilityError>
    where
        T: DeserializeOwned + Send,
    {
        let value = match self.generate(&request).await? {
            Generation::Object(value) => value,
            // Models frequently answer structured requests with JSON text
            Generation::Text(text) => serde_json::from_str(text.trim())
                .map_err(|e| CapabilityError::Unparseable(format!("{e}: {text}")))?,
        };
        serde_json::from_value(value).map_err(|e| CapabilityError::Unparseable(e.to_string()))
    }
}
