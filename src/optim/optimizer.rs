//! Optimizer trait

use crate::autograd::{FeedbackContext, Variable};
use crate::error::Result;
use async_trait::async_trait;

/// Trait for feedback application strategies
#[async_trait]
pub trait Optimizer: Send {
    /// Apply the feedback accumulated by a completed pass.
    ///
    /// Returns the number of parameters whose state was updated.
    async fn step(&mut self, ctx: &FeedbackContext) -> Result<usize>;

    /// Parameters this optimizer is responsible for
    fn parameters(&self) -> &[Variable];

    /// Clear all parameter buffers
    fn zero_feedback(&self) {
        for param in self.parameters() {
            param.zero_feedback();
        }
    }
}
