//! Replaying reasoner
//!
//! Answers requests from a FIFO queue of canned responses and records every
//! request it sees. Used by tests and by the CLI when no provider is wired in.

use super::{CapabilityError, Generation, Reasoner, ReasoningRequest};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

type Responder =
    Box<dyn Fn(&ReasoningRequest) -> Result<Generation, CapabilityError> + Send + Sync>;

enum Scripted {
    Respond(Generation),
    Fail(String),
}

/// Reasoner that replays queued responses
#[derive(Default)]
pub struct ScriptedReasoner {
    queue: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ReasoningRequest>>,
    responder: Option<Responder>,
}

impl ScriptedReasoner {
    /// Create an empty reasoner; every call fails until responses are queued
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reasoner that answers from a closure once the queue is empty
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&ReasoningRequest) -> Result<Generation, CapabilityError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    /// Create a reasoner preloaded with responses
    pub fn with_responses(responses: impl IntoIterator<Item = Generation>) -> Self {
        let reasoner = Self::new();
        for response in responses {
            reasoner.push(response);
        }
        reasoner
    }

    /// Queue a response
    pub fn push(&self, response: Generation) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Scripted::Respond(response));
    }

    /// Queue a text response
    pub fn push_text(&self, text: impl Into<String>) {
        self.push(Generation::Text(text.into()));
    }

    /// Queue an object response
    pub fn push_object(&self, value: serde_json::Value) {
        self.push(Generation::Object(value));
    }

    /// Queue a failure
    pub fn push_failure(&self, message: impl Into<String>) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Scripted::Fail(message.into()));
    }

    /// Requests seen so far, in call order
    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls made
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of queued responses not yet consumed
    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for ScriptedReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedReasoner")
            .field("pending", &self.pending())
            .field("calls", &self.call_count())
            .field("responder", &self.responder.is_some())
            .finish()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn generate(&self, request: &ReasoningRequest) -> Result<Generation, CapabilityError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let next = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(CapabilityError::Failed(message)),
            None => match &self.responder {
                Some(responder) => responder(request),
                None => Err(CapabilityError::Exhausted(request.task.clone())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_exhausts() {
        let reasoner = ScriptedReasoner::new();
        reasoner.push_text("one");
        reasoner.push_failure("boom");

        let request = ReasoningRequest::text("task");
        assert_eq!(
            reasoner.generate(&request).await.unwrap(),
            Generation::Text("one".into())
        );
        assert!(matches!(
            reasoner.generate(&request).await,
            Err(CapabilityError::Failed(_))
        ));
        assert!(matches!(
            reasoner.generate(&request).await,
            Err(CapabilityError::Exhausted(_))
        ));
        assert_eq!(reasoner.call_count(), 3);
    }

    #[tokio::test]
    async fn test_responder_used_after_queue() {
        let reasoner = ScriptedReasoner::from_fn(|request| {
            Ok(Generation::Text(format!("echo {}", request.task)))
        });
        reasoner.push_text("queued");

        let first = reasoner.generate(&ReasoningRequest::text("a")).await.unwrap();
        let second = reasoner.generate(&ReasoningRequest::text("b")).await.unwrap();
        assert_eq!(first, Generation::Text("queued".into()));
        assert_eq!(second, Generation::Text("echo b".into()));
    }
}
