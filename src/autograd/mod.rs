//! Feedback autograd engine
//!
//! Nodes ([`Variable`]) hold opaque payloads and record the nodes they were
//! derived from. Operations bind a propagation closure ([`BackwardOp`]) to
//! the nodes they produce; [`backward`] walks the graph in reverse
//! topological order and lets each closure push feedback onto its inputs.
//! Terminal nodes turn their accumulated feedback into a state update when an
//! optimizer calls [`Variable::apply_feedback`].

mod backward;
mod context;
mod feedback;
mod function;
mod module;
mod ops;
mod variable;


pub use backward::{backward, topological_order, BackwardOp};
pub use context::FeedbackContext;
pub use feedback::{feedback_json, Change, Feedback};
pub use function::{call, call_suspending, start, Function, ResumeHandle, SuspendingFunction};
pub use module::{collect_parameters, Module};
pub use ops::{apply_loss, sum, ConstantLoss, Loss, Sum};
pub use variable::{any_requires_feedback, Data, NodeKey, Variable};

pub(crate) use variable::Node;
