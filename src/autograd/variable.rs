//! Graph nodes with feedback tracking

use super::{BackwardOp, Feedback};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use tracing::debug;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Payload carried by a node.
///
/// The engine never inspects a payload beyond [`Data::json`], which is used
/// when a value has to be shown to the reasoning capability. Terminal node
/// types (parameters, stores) override [`Data::apply_feedback`].
#[async_trait]
pub trait Data: Send + Sync + 'static {
    /// Human-readable type of the payload, e.g. `"Story dialogue"`
    fn datatype(&self) -> &str;

    /// Snapshot of the payload
    fn json(&self) -> serde_json::Value;

    /// Turn accumulated feedback into a state update.
    ///
    /// Only called by an optimizer, with a non-empty, finalized buffer.
    async fn apply_feedback(&self, feedback: &[Feedback]) -> Result<()> {
        let _ = feedback;
        Err(Error::application(
            self.datatype(),
            "node type does not accept feedback application",
        ))
    }
}

/// Identity of a node, usable as a map key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(usize);

pub(crate) struct Node<T: ?Sized> {
    id: u64,
    name: String,
    predecessors: Vec<Variable>,
    requires_feedback: bool,
    feedback: Mutex<Vec<Feedback>>,
    backward_op: OnceLock<Arc<dyn BackwardOp>>,
    data: T,
}

/// Shared handle to a graph node.
///
/// Cloning the handle does not copy the node; equality and hashing follow
/// node identity. `Variable` without a type parameter is the type-erased
/// form used for predecessor edges.
pub struct Variable<T: ?Sized = dyn Data>(pub(crate) Arc<Node<T>>);

impl<T: Data> Variable<T> {
    /// Create a node derived from `predecessors`.
    ///
    /// Fails with [`Error::Invariant`] when `requires_feedback` is false but a
    /// predecessor requires feedback.
    pub fn new(data: T, predecessors: Vec<Variable>, requires_feedback: bool) -> Result<Self> {
        let name = default_name(data.datatype());
        Self::named(name, data, predecessors, requires_feedback)
    }

    /// Same as [`Variable::new`] with an explicit name
    pub fn named(
        name: impl Into<String>,
        data: T,
        predecessors: Vec<Variable>,
        requires_feedback: bool,
    ) -> Result<Self> {
        let name = name.into();
        if !requires_feedback {
            if let Some(offender) = predecessors.iter().find(|p| p.requires_feedback()) {
                return Err(Error::Invariant(format!(
                    "{name} does not require feedback but its predecessor {} does",
                    offender.name()
                )));
            }
        }

        let id = NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed);
        Ok(Self(Arc::new(Node {
            id,
            name,
            predecessors,
            requires_feedback,
            feedback: Mutex::new(Vec::new()),
            backward_op: OnceLock::new(),
            data,
        })))
    }

    /// Node derived from `predecessors` that requires feedback exactly when one
    /// of them does. Cannot violate the construction invariant.
    pub fn derived(data: T, predecessors: Vec<Variable>) -> Self {
        let requires_feedback = any_requires_feedback(&predecessors);
        let id = NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed);
        Self(Arc::new(Node {
            id,
            name: default_name(data.datatype()),
            predecessors,
            requires_feedback,
            feedback: Mutex::new(Vec::new()),
            backward_op: OnceLock::new(),
            data,
        }))
    }

    /// Leaf node that accepts feedback
    pub fn parameter(data: T) -> Self {
        Self::leaf(default_name(data.datatype()), data, true)
    }

    /// Leaf node that never receives feedback
    pub fn constant(data: T) -> Self {
        Self::leaf(default_name(data.datatype()), data, false)
    }

    /// Named leaf node
    pub fn leaf(name: impl Into<String>, data: T, requires_feedback: bool) -> Self {
        let id = NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed);
        Self(Arc::new(Node {
            id,
            name: name.into(),
            predecessors: Vec::new(),
            requires_feedback,
            feedback: Mutex::new(Vec::new()),
            backward_op: OnceLock::new(),
            data,
        }))
    }

    /// Type-erased handle to the same node
    pub fn erase(&self) -> Variable {
        let node: Arc<Node<dyn Data>> = self.0.clone();
        Variable(node)
    }

    pub(crate) fn downgrade(&self) -> Weak<Node<T>> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn upgrade(weak: &Weak<Node<T>>) -> Option<Self> {
        weak.upgrade().map(Self)
    }

    /// Run a backward pass rooted at this node
    pub async fn backward(&self) -> Result<super::FeedbackContext> {
        super::backward(&self.erase()).await
    }
}

impl<T: ?Sized + Data> Variable<T> {
    /// Process-unique id, for logs
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Node name
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Identity key
    pub fn key(&self) -> NodeKey {
        NodeKey(Arc::as_ptr(&self.0).cast::<()>() as usize)
    }

    /// Whether feedback may flow into this node
    pub fn requires_feedback(&self) -> bool {
        self.0.requires_feedback
    }

    /// Nodes this node was derived from
    pub fn predecessors(&self) -> &[Variable] {
        &self.0.predecessors
    }

    /// Payload reference
    pub fn data(&self) -> &T {
        &self.0.data
    }

    /// Payload snapshot
    pub fn json(&self) -> serde_json::Value {
        self.0.data.json()
    }

    /// Copy of the feedback buffer
    pub fn feedback(&self) -> Vec<Feedback> {
        self.buffer().clone()
    }

    /// Whether the buffer holds anything
    pub fn has_feedback(&self) -> bool {
        !self.buffer().is_empty()
    }

    /// Raise feedback against this node directly.
    ///
    /// This is how a caller seeds a pass before calling `backward`. During a
    /// pass, closures append through the
    /// [`FeedbackContext`](super::FeedbackContext) instead.
    pub fn append_feedback(&self, item: impl Into<Feedback>) {
        let item = item.into();
        if !self.requires_feedback() {
            debug!(node = %self.name(), %item, "dropping feedback for node that does not require it");
            return;
        }
        self.buffer().push(item);
    }

    pub(crate) fn extend_feedback(&self, items: Vec<Feedback>) {
        self.buffer().extend(items);
    }

    pub(crate) fn take_feedback(&self) -> Vec<Feedback> {
        std::mem::take(&mut *self.buffer())
    }

    /// Clear the feedback buffer
    pub fn zero_feedback(&self) {
        self.buffer().clear();
    }

    /// Bound propagation closure, if any
    pub fn backward_op(&self) -> Option<Arc<dyn BackwardOp>> {
        self.0.backward_op.get().cloned()
    }

    /// Bind the propagation closure. A node accepts exactly one.
    pub fn set_backward_op(&self, op: Arc<dyn BackwardOp>) -> Result<()> {
        self.0
            .backward_op
            .set(op)
            .map_err(|_| Error::Invariant(format!("{} already has a backward op", self.name())))
    }

    /// Bind an op to a node created by the caller a moment ago
    pub(crate) fn bind_fresh(&self, op: Arc<dyn BackwardOp>) {
        // A node nobody else has seen cannot have an op bound yet
        let _ = self.0.backward_op.set(op);
    }

    /// Apply the buffered feedback through the payload's hook, then clear it.
    ///
    /// Empty buffers are a no-op. On failure the buffer is left intact.
    pub async fn apply_feedback(&self) -> Result<()> {
        let items = self.feedback();
        if items.is_empty() {
            return Ok(());
        }

        debug!(node = %self.name(), items = items.len(), "applying feedback");
        self.0.data.apply_feedback(&items).await?;

        // Keep anything appended while the hook was running
        let mut buffer = self.buffer();
        let applied = items.len().min(buffer.len());
        buffer.drain(..applied);
        Ok(())
    }

    fn buffer(&self) -> std::sync::MutexGuard<'_, Vec<Feedback>> {
        self.0
            .feedback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: ?Sized> Clone for Variable<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> Deref for Variable<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0.data
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<Variable<U>> for Variable<T> {
    fn eq(&self, other: &Variable<U>) -> bool {
        Arc::as_ptr(&self.0).cast::<()>() == Arc::as_ptr(&other.0).cast::<()>()
    }
}

impl<T: ?Sized> Eq for Variable<T> {}

impl<T: ?Sized> std::hash::Hash for Variable<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).cast::<()>().hash(state);
    }
}

impl<T: ?Sized + Data> fmt::Debug for Variable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("datatype", &self.0.data.datatype())
            .field("requires_feedback", &self.requires_feedback())
            .field("predecessors", &self.predecessors().len())
            .field("feedback", &self.buffer().len())
            .finish()
    }
}

/// Whether any of `inputs` requires feedback
pub fn any_requires_feedback(inputs: &[Variable]) -> bool {
    inputs.iter().any(|v| v.requires_feedback())
}

fn default_name(datatype: &str) -> String {
    datatype.trim().replace(' ', "_").to_lowercase()
}
