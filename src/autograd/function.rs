//! Operations: stateless forward/backward pairs and suspending operations

use super::{BackwardOp, Data, FeedbackContext, Node, Variable};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::trace;

/// A stateless forward/backward pair.
///
/// `forward` derives one output node from the inputs. `backward` runs once
/// the output's buffer is finalized and decides what, if anything, each input
/// receives. A `backward` that appends nothing drops the output's feedback;
/// implementations should make that choice visibly.
#[async_trait]
pub trait Function: Send + Sync + 'static {
    type Output: Data;

    async fn forward(&self, inputs: &[Variable]) -> Result<Variable<Self::Output>>;

    async fn backward(
        &self,
        result: &Variable<Self::Output>,
        inputs: &[Variable],
        ctx: &FeedbackContext,
    ) -> Result<()>;
}

/// An operation split at the point where it needs feedback it does not have yet.
///
/// `start` computes a provisional result and whatever it needs to remember;
/// `resume` runs once the caller has finished appending feedback for that
/// result, and pushes derived feedback onto the inputs. A result that outlives
/// one backward pass is resumed once per pass, each time with a copy of the
/// saved state. A failed resumption poisons the operation.
#[async_trait]
pub trait SuspendingFunction: Send + Sync + 'static {
    type Output: Data;
    type State: Clone + Send + Sync + 'static;

    async fn start(&self, inputs: &[Variable]) -> Result<(Variable<Self::Output>, Self::State)>;

    async fn resume(
        &self,
        result: &Variable<Self::Output>,
        state: Self::State,
        ctx: &FeedbackContext,
    ) -> Result<()>;
}

/// Run `function` forward and bind its backward to the result
pub async fn call<F: Function>(
    function: Arc<F>,
    inputs: Vec<Variable>,
) -> Result<Variable<F::Output>> {
    let result = function.forward(&inputs).await?;
    let op = Arc::new(FunctionBackward {
        function,
        result: result.downgrade(),
        inputs,
    });
    result.set_backward_op(op)?;
    Ok(result)
}

/// Start a suspending operation.
///
/// The returned handle is also bound as the result's backward op, so a
/// backward pass resumes it automatically; callers driving the protocol by
/// hand resume through the handle instead.
pub async fn start<F: SuspendingFunction>(
    function: Arc<F>,
    inputs: Vec<Variable>,
) -> Result<(Variable<F::Output>, ResumeHandle)> {
    let (result, state) = function.start(&inputs).await?;
    let suspension: Arc<dyn BackwardOp> = Arc::new(Suspension {
        function,
        result: result.downgrade(),
        state: Mutex::new(Resumable::Ready(state)),
    });
    result.set_backward_op(Arc::clone(&suspension))?;
    let handle = ResumeHandle {
        node: result.erase(),
        op: suspension,
    };
    Ok((result, handle))
}

/// Start a suspending operation and keep only its result
pub async fn call_suspending<F: SuspendingFunction>(
    function: Arc<F>,
    inputs: Vec<Variable>,
) -> Result<Variable<F::Output>> {
    let (result, _handle) = start(function, inputs).await?;
    Ok(result)
}

/// Resumes a suspended operation outside a backward pass
pub struct ResumeHandle {
    node: Variable,
    op: Arc<dyn BackwardOp>,
}

impl ResumeHandle {
    /// The provisional result
    pub fn result(&self) -> &Variable {
        &self.node
    }

    /// Resume with the feedback appended so far.
    ///
    /// Finalizes the result's buffer, then drains it into `ctx` once the
    /// operation has pushed its derived feedback.
    pub async fn resume(&self, ctx: &FeedbackContext) -> Result<()> {
        if self.node.has_feedback() {
            ctx.register(&self.node);
        }
        ctx.finalize(&self.node);
        self.op.backward(&self.node, ctx).await?;
        ctx.retire(&self.node);
        Ok(())
    }
}

impl std::fmt::Debug for ResumeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeHandle")
            .field("result", &self.node.name())
            .finish()
    }
}

struct FunctionBackward<F: Function> {
    function: Arc<F>,
    result: Weak<Node<F::Output>>,
    inputs: Vec<Variable>,
}

#[async_trait]
impl<F: Function> BackwardOp for FunctionBackward<F> {
    async fn backward(&self, node: &Variable, ctx: &FeedbackContext) -> Result<()> {
        let result = Variable::upgrade(&self.result)
            .ok_or_else(|| Error::Invariant(format!("{} was dropped mid-pass", node.name())))?;
        trace!(node = %node.name(), inputs = self.inputs.len(), "function backward");
        self.function.backward(&result, &self.inputs, ctx).await
    }
}

enum Resumable<S> {
    Ready(S),
    Poisoned,
}

struct Suspension<F: SuspendingFunction> {
    function: Arc<F>,
    result: Weak<Node<F::Output>>,
    state: Mutex<Resumable<F::State>>,
}

impl<F: SuspendingFunction> Suspension<F> {
    fn saved_state(&self, name: &str) -> Result<F::State> {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            Resumable::Ready(state) => Ok(state.clone()),
            Resumable::Poisoned => Err(Error::SuspensionPoisoned(name.to_string())),
        }
    }
}

#[async_trait]
impl<F: SuspendingFunction> BackwardOp for Suspension<F> {
    async fn backward(&self, node: &Variable, ctx: &FeedbackContext) -> Result<()> {
        let state = self.saved_state(node.name())?;
        let result = Variable::upgrade(&self.result)
            .ok_or_else(|| Error::Invariant(format!("{} was dropped mid-pass", node.name())))?;
        trace!(node = %node.name(), "resuming suspended operation");

        let outcome = self.function.resume(&result, state, ctx).await;
        if outcome.is_err() {
            *self.state.lock().unwrap_or_else(PoisonError::into_inner) = Resumable::Poisoned;
        }
        outcome
    }
}
