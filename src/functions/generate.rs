//! Generation with per-input explanations

use super::{input_keys, named_inputs};
use crate::autograd::{feedback_json, Feedback, FeedbackContext, SuspendingFunction, Variable};
use crate::error::Result;
use crate::reasoning::{Reasoner, ReasonerExt, ReasoningRequest, ResponseKind};
use crate::variables::Value;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

const EXPLAIN_TASK: &str = "The ERRATA was identified in the RESULT generated from the INPUTS. \
    Identify possible causes of the ERRATA in TARGET and suggest a correction. \
    Don't change anything other than what's specified in the ERRATA. \
    Only specify causes and suggestions for TARGET.";

/// Generates a value from its inputs and, going backward, explains the
/// result's feedback in terms of each input separately.
///
/// The explanations are independent, so they run concurrently and are joined
/// before the resumption completes.
pub struct Generate {
    reasoner: Arc<dyn Reasoner>,
    datatype: String,
    task: String,
    response: ResponseKind,
}

impl Generate {
    /// Generate free-form text
    pub fn text(reasoner: Arc<dyn Reasoner>, datatype: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            reasoner,
            datatype: datatype.into(),
            task: task.into(),
            response: ResponseKind::Text,
        }
    }

    /// Generate a structured object
    pub fn object(reasoner: Arc<dyn Reasoner>, datatype: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            response: ResponseKind::Object,
            ..Self::text(reasoner, datatype, task)
        }
    }

    async fn explain(
        &self,
        target: &Variable,
        key: &str,
        inputs: &serde_json::Map<String, serde_json::Value>,
        result: &Variable<Value>,
        errata: &serde_json::Value,
    ) -> Result<(Variable, String)> {
        let request = ReasoningRequest::text(EXPLAIN_TASK)
            .with("INPUTS", inputs.clone())
            .with("RESULT", result.json())
            .with("ERRATA", errata.clone())
            .with("TARGET", key);
        let explanation = self.reasoner.query_text(request).await?;
        Ok((target.clone(), explanation))
    }
}

#[async_trait]
impl SuspendingFunction for Generate {
    type Output = Value;
    type State = ();

    async fn start(&self, inputs: &[Variable]) -> Result<(Variable<Value>, ())> {
        let mut request = match self.response {
            ResponseKind::Text => ReasoningRequest::text(self.task.as_str()),
            ResponseKind::Object => ReasoningRequest::object(self.task.as_str()),
        };
        for (key, value) in named_inputs(inputs) {
            request = request.with(key, value);
        }
        let generated = match self.response {
            ResponseKind::Text => serde_json::Value::String(self.reasoner.query_text(request).await?),
            ResponseKind::Object => self.reasoner.query_object::<serde_json::Value>(request).await?,
        };

        let value = Value::new(self.datatype.as_str(), generated).with_reasoner(Arc::clone(&self.reasoner));
        Ok((Variable::derived(value, inputs.to_vec()), ()))
    }

    async fn resume(&self, result: &Variable<Value>, _state: (), ctx: &FeedbackContext) -> Result<()> {
        let feedback = result.feedback();
        if feedback.is_empty() {
            return Ok(());
        }

        let inputs = result.predecessors();
        let keys = input_keys(inputs);
        let named = named_inputs(inputs);
        let errata = feedback_json(&feedback);
        let explanations = try_join_all(
            inputs
                .iter()
                .zip(&keys)
                .filter(|(input, _)| input.requires_feedback())
                .map(|(target, key)| self.explain(target, key, &named, result, &errata)),
        )
        .await?;

        debug!(result = %result.name(), explained = explanations.len(), "generation feedback explained");
        for (target, explanation) in explanations {
            ctx.push(&target, Feedback::Text(explanation));
        }
        Ok(())
    }
}
