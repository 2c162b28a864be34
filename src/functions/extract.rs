//! Structured extraction and feedback assignment

use super::{input_keys, named_inputs};
use crate::autograd::{feedback_json, Data, Feedback, FeedbackContext, Function, Variable};
use crate::error::Result;
use crate::reasoning::{Reasoner, ReasonerExt, ReasoningRequest};
use crate::variables::Value;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const ASSIGN_TASK: &str = "The FEEDBACK was given when extracting RESULT from INPUTS. \
    Based on the errors, determine which list of FEEDBACK items applies to each input.";

/// Feedback items the reasoner attributes to one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub input_name: String,
    pub relevant_feedback: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignments {
    pub assignments: Vec<Assignment>,
}

/// Ask the reasoner which of `result`'s feedback items belong to which input,
/// then append them to those inputs.
///
/// Inputs are addressed by node name, or by `name#<position>` when names
/// collide. Assignments naming an unknown input are dropped and logged. Returns the number of items appended.
pub async fn assign_feedback<T: ?Sized + Data>(
    reasoner: &dyn Reasoner,
    result: &Variable<T>,
    inputs: &[Variable],
    ctx: &FeedbackContext,
    task: &str,
) -> Result<usize> {
    let feedback = result.feedback();
    if feedback.is_empty() {
        return Ok(0);
    }

    let request = ReasoningRequest::object(task)
        .with("INPUTS", named_inputs(inputs))
        .with("RESULT", result.json())
        .with("FEEDBACK", feedback_json(&feedback));
    let proposed: Assignments = reasoner.query_object(request).await?;

    let keys = input_keys(inputs);
    let mut appended = 0;
    for assignment in proposed.assignments {
        let Some(input) = keys
            .iter()
            .position(|key| *key == assignment.input_name)
            .map(|position| &inputs[position])
        else {
            warn!(
                result = %result.name(),
                input = %assignment.input_name,
                items = assignment.relevant_feedback.len(),
                "feedback assigned to unknown input; dropping"
            );
            continue;
        };
        appended += ctx.append(
            input,
            assignment.relevant_feedback.into_iter().map(Feedback::Text),
        );
    }

    debug!(result = %result.name(), appended, "feedback assigned");
    Ok(appended)
}

/// Extracts a structured value of `datatype` from its inputs
pub struct ExtractObject {
    reasoner: Arc<dyn Reasoner>,
    datatype: String,
    task: String,
}

impl ExtractObject {
    pub fn new(reasoner: Arc<dyn Reasoner>, datatype: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            reasoner,
            datatype: datatype.into(),
            task: task.into(),
        }
    }
}

#[async_trait]
impl Function for ExtractObject {
    type Output = Value;

    async fn forward(&self, inputs: &[Variable]) -> Result<Variable<Value>> {
        let mut request = ReasoningRequest::object(self.task.as_str())
            .with("DATATYPE", self.datatype.as_str());
        for (key, value) in named_inputs(inputs) {
            request = request.with(key, value);
        }
        let extraction: serde_json::Value = self.reasoner.query_object(request).await?;

        let value = Value::new(self.datatype.as_str(), extraction).with_reasoner(Arc::clone(&self.reasoner));
        Ok(Variable::derived(value, inputs.to_vec()))
    }

    async fn backward(
        &self,
        result: &Variable<Value>,
        inputs: &[Variable],
        ctx: &FeedbackContext,
    ) -> Result<()> {
        assign_feedback(self.reasoner.as_ref(), result, inputs, ctx, ASSIGN_TASK).await?;
        Ok(())
    }
}
