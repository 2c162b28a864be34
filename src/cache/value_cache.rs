//! Single-value cache

use crate::autograd::{call_suspending, FeedbackContext, Module, SuspendingFunction, Variable};
use crate::error::{Error, Result};
use crate::variables::Value;
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

type Slot = Arc<RwLock<Variable<Value>>>;

/// Holds the most recently loaded value.
///
/// `load` copies the value into a new context node whose predecessors are the
/// previous context and the loaded value. Feedback on the context goes to the
/// value it was loaded from.
pub struct ValueCache {
    slot: Slot,
}

impl ValueCache {
    pub fn new(initial: Variable<Value>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(initial)),
        }
    }

    /// Current context node
    pub fn context(&self) -> Variable<Value> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn load(&self, value: &Variable<Value>) -> Result<Variable<Value>> {
        let op = Arc::new(LoadValue {
            slot: Arc::clone(&self.slot),
        });
        call_suspending(op, vec![self.context().erase(), value.erase()]).await
    }
}

impl Module for ValueCache {
    fn variables(&self) -> Vec<Variable> {
        vec![self.context().erase()]
    }
}

struct LoadValue {
    slot: Slot,
}

#[async_trait]
impl SuspendingFunction for LoadValue {
    type Output = Value;
    type State = Variable;

    async fn start(&self, inputs: &[Variable]) -> Result<(Variable<Value>, Variable)> {
        let [previous, source] = inputs else {
            return Err(Error::Invariant(format!(
                "value cache load takes 2 inputs, got {}",
                inputs.len()
            )));
        };
        let loaded = self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .derive(source.json());
        let context = Variable::derived(loaded, vec![previous.clone(), source.clone()]);
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = context.clone();
        debug!(source = %source.name(), "value cache loaded");
        Ok((context, source.clone()))
    }

    async fn resume(&self, result: &Variable<Value>, source: Variable, ctx: &FeedbackContext) -> Result<()> {
        ctx.append(&source, result.feedback());
        Ok(())
    }
}
