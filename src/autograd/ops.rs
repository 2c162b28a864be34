//! Basic graph operations with backward passes

use super::{call, BackwardOp, Data, Feedback, FeedbackContext, Function, Variable};
use crate::error::Result;
use async_trait::async_trait;
use std::ops::Add;
use std::sync::Arc;

/// Payload of a combination node: snapshots of the combined values
#[derive(Debug, Clone)]
pub struct Sum {
    parts: Vec<serde_json::Value>,
}

impl Sum {
    /// Combined values, in input order
    pub fn parts(&self) -> &[serde_json::Value] {
        &self.parts
    }
}

impl Data for Sum {
    fn datatype(&self) -> &str {
        "Sum"
    }

    fn json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.parts.clone())
    }
}

/// Combine several nodes into one. Feedback on the combination reaches every
/// input unchanged.
pub fn sum(inputs: &[Variable]) -> Variable<Sum> {
    let parts = inputs.iter().map(|v| v.json()).collect();
    let result = Variable::derived(Sum { parts }, inputs.to_vec());
    result.bind_fresh(Arc::new(SumBackward {
        inputs: inputs.to_vec(),
    }));
    result
}

struct SumBackward {
    inputs: Vec<Variable>,
}

#[async_trait]
impl BackwardOp for SumBackward {
    async fn backward(&self, node: &Variable, ctx: &FeedbackContext) -> Result<()> {
        let feedback = node.feedback();
        if feedback.is_empty() {
            return Ok(());
        }
        for input in self.inputs.iter().filter(|i| i.requires_feedback()) {
            ctx.append(input, feedback.clone());
        }
        Ok(())
    }
}

impl Add for &Variable {
    type Output = Variable<Sum>;

    fn add(self, other: &Variable) -> Variable<Sum> {
        sum(&[self.clone(), other.clone()])
    }
}

impl Add for Variable {
    type Output = Variable<Sum>;

    fn add(self, other: Variable) -> Variable<Sum> {
        sum(&[self, other])
    }
}

/// Payload of a loss node
#[derive(Debug, Clone)]
pub struct Loss {
    feedback: Feedback,
}

impl Loss {
    /// The feedback this loss raises
    pub fn feedback(&self) -> &Feedback {
        &self.feedback
    }
}

impl Data for Loss {
    fn datatype(&self) -> &str {
        "Loss"
    }

    fn json(&self) -> serde_json::Value {
        self.feedback.to_json()
    }
}

/// Raises a fixed piece of feedback against every input
#[derive(Debug, Clone)]
pub struct ConstantLoss {
    feedback: Feedback,
}

impl ConstantLoss {
    pub fn new(feedback: impl Into<Feedback>) -> Self {
        Self {
            feedback: feedback.into(),
        }
    }
}

#[async_trait]
impl Function for ConstantLoss {
    type Output = Loss;

    async fn forward(&self, inputs: &[Variable]) -> Result<Variable<Loss>> {
        Ok(Variable::derived(
            Loss {
                feedback: self.feedback.clone(),
            },
            inputs.to_vec(),
        ))
    }

    async fn backward(
        &self,
        result: &Variable<Loss>,
        inputs: &[Variable],
        ctx: &FeedbackContext,
    ) -> Result<()> {
        // Anything raised on the loss node itself travels with the loss
        let mut feedback = vec![self.feedback.clone()];
        feedback.extend(result.feedback());

        for input in inputs.iter().filter(|i| i.requires_feedback()) {
            ctx.append(input, feedback.clone());
        }
        Ok(())
    }
}

/// Attach `feedback` to `inputs` through a loss node
pub async fn apply_loss(inputs: &[Variable], feedback: impl Into<Feedback>) -> Result<Variable<Loss>> {
    call(Arc::new(ConstantLoss::new(feedback)), inputs.to_vec()).await
}
