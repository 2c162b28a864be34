//! Per-pass feedback bookkeeping

use super::{Data, Feedback, NodeKey, Variable};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{trace, warn};

/// Feedback accumulated during one backward pass.
///
/// Buffers live on the nodes themselves; the context records which nodes
/// received feedback in this pass and which buffers are already finalized.
/// A node is finalized right before its own backward op runs, since every
/// consumer that could contribute to it has run by then. Once its op has
/// succeeded the node's buffer is drained into the context, so long-lived
/// intermediates do not carry stale feedback into a later pass. Leaves keep
/// their buffers for the optimizer. Once the pass is sealed, no buffer
/// accepts appends through this context.
#[derive(Debug, Default)]
pub struct FeedbackContext {
    inner: Mutex<Inner>,
    sealed: AtomicBool,
}

#[derive(Debug, Default)]
struct Inner {
    touched: Vec<(NodeKey, String)>,
    seen: HashSet<NodeKey>,
    finalized: HashSet<NodeKey>,
    retired: HashMap<NodeKey, Vec<Feedback>>,
}

impl FeedbackContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Append feedback for `node`. Returns how many items were accepted.
    ///
    /// Items are dropped (and logged) when the node does not require
    /// feedback, when its buffer is already finalized, or when the pass is
    /// sealed.
    pub fn append<T: ?Sized + Data>(
        &self,
        node: &Variable<T>,
        items: impl IntoIterator<Item = Feedback>,
    ) -> usize {
        let items: Vec<Feedback> = items.into_iter().collect();
        if items.is_empty() {
            return 0;
        }
        if !node.requires_feedback() {
            trace!(node = %node.name(), count = items.len(), "node does not require feedback");
            return 0;
        }
        if self.is_sealed() {
            warn!(node = %node.name(), count = items.len(), "append after pass was sealed; dropping");
            return 0;
        }

        let mut inner = self.lock();
        if inner.finalized.contains(&node.key()) {
            warn!(node = %node.name(), count = items.len(), "append to finalized buffer; dropping");
            return 0;
        }
        if inner.seen.insert(node.key()) {
            inner.touched.push((node.key(), node.name().to_string()));
        }
        let count = items.len();
        node.extend_feedback(items);
        count
    }

    /// Append a single item
    pub fn push<T: ?Sized + Data>(&self, node: &Variable<T>, item: impl Into<Feedback>) -> bool {
        self.append(node, [item.into()]) == 1
    }

    /// Feedback `node` accumulated in this pass
    pub fn get<T: ?Sized + Data>(&self, node: &Variable<T>) -> Vec<Feedback> {
        if let Some(items) = self.lock().retired.get(&node.key()) {
            return items.clone();
        }
        node.feedback()
    }

    /// Whether `node` has any feedback in this pass
    pub fn contains<T: ?Sized + Data>(&self, node: &Variable<T>) -> bool {
        let inner = self.lock();
        if !inner.seen.contains(&node.key()) {
            return false;
        }
        match inner.retired.get(&node.key()) {
            Some(items) => !items.is_empty(),
            None => node.has_feedback(),
        }
    }

    /// Names of nodes that received feedback, in first-touch order
    pub fn touched(&self) -> Vec<String> {
        self.lock()
            .touched
            .iter()
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Number of nodes that received feedback
    pub fn len(&self) -> usize {
        self.lock().touched.len()
    }

    /// Whether no node received feedback
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `node`'s buffer is closed for this pass
    pub fn is_finalized<T: ?Sized + Data>(&self, node: &Variable<T>) -> bool {
        self.is_sealed() || self.lock().finalized.contains(&node.key())
    }

    /// Whether the pass has completed
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Record a node whose buffer was filled before the pass started
    pub(crate) fn register<T: ?Sized + Data>(&self, node: &Variable<T>) {
        let mut inner = self.lock();
        if inner.seen.insert(node.key()) {
            inner.touched.push((node.key(), node.name().to_string()));
        }
    }

    pub(crate) fn finalize<T: ?Sized + Data>(&self, node: &Variable<T>) {
        self.lock().finalized.insert(node.key());
    }

    /// Move a propagated node's buffer into the context
    pub(crate) fn retire<T: ?Sized + Data>(&self, node: &Variable<T>) {
        let items = node.take_feedback();
        if !items.is_empty() {
            self.lock().retired.insert(node.key(), items);
        }
    }

    pub(crate) fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
