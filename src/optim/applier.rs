//! Feedback applier

use super::Optimizer;
use crate::autograd::{FeedbackContext, NodeKey, Variable};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::{stream, FutureExt, StreamExt, TryStreamExt};
use std::collections::HashSet;
use tracing::{debug, info};

/// Applies each parameter's buffered feedback through its own hook.
///
/// Parameters are independent: applications run concurrently up to
/// `max_concurrency`, and a failure aborts the step without undoing
/// applications that already succeeded.
#[derive(Debug)]
pub struct FeedbackApplier {
    params: Vec<Variable>,
    max_concurrency: usize,
}

impl FeedbackApplier {
    /// Default number of concurrent applications
    pub const DEFAULT_CONCURRENCY: usize = 4;

    /// Create an applier over `params`.
    ///
    /// Duplicates are collapsed. Fails if the set is empty or a parameter does
    /// not require feedback.
    pub fn new(params: impl IntoIterator<Item = Variable>) -> Result<Self> {
        let mut seen: HashSet<NodeKey> = HashSet::new();
        let mut unique = Vec::new();
        for param in params {
            if !param.requires_feedback() {
                return Err(Error::ConfigError(format!(
                    "{} must require feedback to be optimized",
                    param.name()
                )));
            }
            if seen.insert(param.key()) {
                unique.push(param);
            }
        }

        if unique.is_empty() {
            return Err(Error::ConfigError(
                "optimizer got an empty parameter set".to_string(),
            ));
        }

        Ok(Self {
            params: unique,
            max_concurrency: Self::DEFAULT_CONCURRENCY,
        })
    }

    /// Create an applier using engine settings
    pub fn from_config(
        params: impl IntoIterator<Item = Variable>,
        config: &EngineConfig,
    ) -> Result<Self> {
        Ok(Self::new(params)?.with_concurrency(config.max_concurrency))
    }

    /// Set the concurrency limit (at least 1)
    #[must_use]
    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Current concurrency limit
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

#[async_trait]
impl Optimizer for FeedbackApplier {
    async fn step(&mut self, ctx: &FeedbackContext) -> Result<usize> {
        if !ctx.is_sealed() {
            return Err(Error::Invariant(
                "cannot apply feedback while the pass is still accumulating".to_string(),
            ));
        }

        let pending: Vec<Variable> = self
            .params
            .iter()
            .filter(|p| p.has_feedback())
            .cloned()
            .collect();
        if pending.is_empty() {
            debug!(params = self.params.len(), "no parameter received feedback");
            return Ok(0);
        }
        let applied = pending.len();

        let applications: Vec<_> = pending
            .into_iter()
            .map(|param| {
                async move {
                    debug!(node = %param.name(), "applying parameter feedback");
                    param.apply_feedback().await
                }
                .boxed()
            })
            .collect();
        stream::iter(applications)
            .buffer_unordered(self.max_concurrency)
            .try_collect::<Vec<()>>()
            .await?;

        info!(applied, "optimizer step complete");
        Ok(applied)
    }

    fn parameters(&self) -> &[Variable] {
        &self.params
    }
}
