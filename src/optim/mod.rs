//! Optimizers: turn accumulated feedback into state updates

mod applier;
mod optimizer;

#[cfg(test)]
mod tests;

pub use applier::FeedbackApplier;
pub use optimizer::Optimizer;

use crate::autograd::{backward, Variable};
use crate::error::Result;

/// Run a backward pass from `root` and apply the result to `params`
pub async fn step(root: &Variable, params: impl IntoIterator<Item = Variable>) -> Result<usize> {
    let mut optimizer = FeedbackApplier::new(params)?;
    let ctx = backward(root).await?;
    optimizer.step(&ctx).await
}
