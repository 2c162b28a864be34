//! Backward traversal

use super::{FeedbackContext, NodeKey, Variable};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, instrument, trace};

/// Propagation closure bound to a node by the operation that produced it
#[async_trait]
pub trait BackwardOp: Send + Sync {
    /// Redistribute `node`'s finalized feedback onto its inputs through `ctx`
    async fn backward(&self, node: &Variable, ctx: &FeedbackContext) -> Result<()>;
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

struct Frame {
    node: Variable,
    next: usize,
}

/// Nodes reachable from `root` in forward (dependency) order.
///
/// Post-order depth-first search with an identity-keyed visited set; every
/// node appears once and after all of its predecessors. Iterative, so long
/// copy-on-write chains do not exhaust the stack.
pub fn topological_order(root: &Variable) -> Result<Vec<Variable>> {
    let mut order = Vec::new();
    let mut marks: HashMap<NodeKey, Mark> = HashMap::new();
    let mut stack = vec![Frame {
        node: root.clone(),
        next: 0,
    }];
    marks.insert(root.key(), Mark::InProgress);

    while let Some(frame) = stack.last_mut() {
        let next = frame.node.predecessors().get(frame.next).cloned();
        frame.next += 1;

        match next {
            Some(pred) => match marks.get(&pred.key()) {
                Some(Mark::Done) => {}
                Some(Mark::InProgress) => return Err(Error::Traversal(pred.name().to_string())),
                None => {
                    marks.insert(pred.key(), Mark::InProgress);
                    stack.push(Frame {
                        node: pred,
                        next: 0,
                    });
                }
            },
            None => {
                if let Some(done) = stack.pop() {
                    marks.insert(done.node.key(), Mark::Done);
                    order.push(done.node);
                }
            }
        }
    }

    Ok(order)
}

/// Propagate feedback backward from `root`.
///
/// Feedback already sitting in reachable buffers (typically raised on `root`
/// by the caller) seeds the pass. Each node that requires feedback and has a
/// backward op has it invoked exactly once, after all of its consumers, and
/// its buffer is drained into the context afterwards. The first error aborts
/// the pass. The returned context is sealed.
#[instrument(skip_all, fields(root = %root.name()))]
pub async fn backward(root: &Variable) -> Result<FeedbackContext> {
    let order = topological_order(root)?;
    let ctx = FeedbackContext::new();
    for node in order.iter().filter(|n| n.has_feedback()) {
        ctx.register(node);
    }
    debug!(nodes = order.len(), seeded = ctx.len(), "backward pass started");

    for node in order.iter().rev() {
        if !node.requires_feedback() {
            continue;
        }
        let Some(op) = node.backward_op() else {
            continue;
        };

        ctx.finalize(node);
        trace!(node = %node.name(), feedback = node.feedback().len(), "running backward op");
        op.backward(node, &ctx).await?;
        ctx.retire(node);
    }

    ctx.seal();
    debug!(touched = ctx.len(), "backward pass finished");
    Ok(ctx)
}
