//! Bounded working set of database rows

use crate::autograd::{
    call_suspending, Data, Feedback, FeedbackContext, Module, SuspendingFunction, Variable,
};
use crate::database::Database;
use crate::error::{Error, Result};
use crate::storage::Rows;
use crate::variables::Value;
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Rows currently held by a [`DatabaseCache`], least recently loaded first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheContext {
    entries: Vec<(String, serde_json::Value)>,
}

impl CacheContext {
    pub fn entries(&self) -> &[(String, serde_json::Value)] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached rows as a map
    pub fn rows(&self) -> Rows {
        self.entries.iter().cloned().collect()
    }

    /// Move `hits` to the most-recent end, evicting from the front past `capacity`
    fn merged(&self, hits: Vec<(String, serde_json::Value)>, capacity: usize) -> Self {
        let mut entries = self.entries.clone();
        for (key, value) in hits {
            entries.retain(|(k, _)| *k != key);
            entries.push((key, value));
        }
        let excess = entries.len().saturating_sub(capacity);
        entries.drain(..excess);
        Self { entries }
    }
}

#[async_trait]
impl Data for CacheContext {
    fn datatype(&self) -> &str {
        "Database cache"
    }

    fn json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.entries.iter().cloned().collect())
    }

    async fn apply_feedback(&self, feedback: &[Feedback]) -> Result<()> {
        // Context feedback reaches the database only through a backward pass
        warn!(
            items = feedback.len(),
            "feedback applied directly to a cache context is dropped; run a backward pass to route it to the database"
        );
        Ok(())
    }
}

struct CacheState {
    database: Variable<Database>,
    context: RwLock<Variable<CacheContext>>,
    capacity: usize,
}

impl CacheState {
    fn current(&self) -> Variable<CacheContext> {
        self.context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn repoint(&self, context: Variable<CacheContext>) {
        *self.context.write().unwrap_or_else(PoisonError::into_inner) = context;
    }
}

/// Keeps a bounded set of rows from a [`Database`] in a context node.
///
/// Every `load` or `sync` builds a new context node and re-points the cache at
/// it. Store-typed feedback raised on a context goes to the database as-is;
/// text feedback becomes errata scoped to the rows the context held.
pub struct DatabaseCache {
    state: Arc<CacheState>,
    top_k: usize,
}

impl DatabaseCache {
    pub const DEFAULT_TOP_K: usize = 3;

    pub fn new(database: Variable<Database>, capacity: usize) -> Self {
        let context = Variable::leaf("database_cache_context", CacheContext::default(), false);
        Self {
            state: Arc::new(CacheState {
                database,
                context: RwLock::new(context),
                capacity: capacity.max(1),
            }),
            top_k: Self::DEFAULT_TOP_K,
        }
    }

    /// Rows fetched per `load`
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn database(&self) -> &Variable<Database> {
        &self.state.database
    }

    /// Current context node
    pub fn context(&self) -> Variable<CacheContext> {
        self.state.current()
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity
    }

    /// Pull the rows matching `query` into a new context
    pub async fn load(&self, query: &Variable<Value>) -> Result<Variable<CacheContext>> {
        let op = Arc::new(Load {
            state: Arc::clone(&self.state),
            top_k: self.top_k,
        });
        call_suspending(op, vec![query.erase()]).await
    }

    /// Re-read every cached key from the store into a new context.
    ///
    /// Rows deleted from the store since they were loaded fall out of the
    /// cache.
    pub async fn sync(&self) -> Result<Variable<CacheContext>> {
        let op = Arc::new(Resync {
            state: Arc::clone(&self.state),
        });
        call_suspending(op, Vec::new()).await
    }
}

impl Module for DatabaseCache {
    fn variables(&self) -> Vec<Variable> {
        vec![self.state.database.erase(), self.state.current().erase()]
    }
}

/// Route context feedback to the database
fn route(result: &Variable<CacheContext>, database: &Variable<Database>, ctx: &FeedbackContext) {
    let feedback = result.feedback();
    if feedback.is_empty() {
        return;
    }
    let rows = result.rows();
    let routed: Vec<Feedback> = feedback
        .into_iter()
        .map(|item| match item {
            Feedback::Text(change) => Feedback::Errata {
                context: rows.clone(),
                change,
            },
            other => other,
        })
        .collect();
    let count = ctx.append(database, routed);
    debug!(context = %result.name(), routed = count, "cache feedback routed to database");
}

struct Load {
    state: Arc<CacheState>,
    top_k: usize,
}

#[async_trait]
impl SuspendingFunction for Load {
    type Output = CacheContext;
    type State = ();

    async fn start(&self, inputs: &[Variable]) -> Result<(Variable<CacheContext>, ())> {
        let query = inputs
            .first()
            .ok_or_else(|| Error::Invariant("cache load needs a query".to_string()))?;
        let serde_json::Value::String(text) = query.json() else {
            return Err(Error::Invariant(format!("{} is not a text query", query.name())));
        };

        let previous = self.state.current();
        let hits = self.state.database.query(&text, self.top_k).await?;
        debug!(query = %text, hits = hits.len(), "cache load");
        let loaded = previous.merged(hits, self.state.capacity);

        let predecessors = vec![previous.erase(), query.clone(), self.state.database.erase()];
        let context = Variable::derived(loaded, predecessors);
        self.state.repoint(context.clone());
        Ok((context, ()))
    }

    async fn resume(&self, result: &Variable<CacheContext>, _state: (), ctx: &FeedbackContext) -> Result<()> {
        route(result, &self.state.database, ctx);
        Ok(())
    }
}

struct Resync {
    state: Arc<CacheState>,
}

#[async_trait]
impl SuspendingFunction for Resync {
    type Output = CacheContext;
    type State = Variable<CacheContext>;

    async fn start(&self, _inputs: &[Variable]) -> Result<(Variable<CacheContext>, Self::State)> {
        let previous = self.state.current();
        let mut entries = Vec::with_capacity(previous.len());
        for key in previous.keys() {
            if let Some(value) = self.state.database.get(key).await? {
                entries.push((key.to_string(), value));
            }
        }
        debug!(kept = entries.len(), dropped = previous.len() - entries.len(), "cache sync");

        let context = Variable::derived(
            CacheContext { entries },
            vec![self.state.database.erase(), previous.erase()],
        );
        self.state.repoint(context.clone());
        Ok((context, previous))
    }

    async fn resume(
        &self,
        result: &Variable<CacheContext>,
        previous: Self::State,
        ctx: &FeedbackContext,
    ) -> Result<()> {
        if previous.requires_feedback() {
            ctx.append(&previous, result.feedback());
        } else {
            // Nothing was ever loaded through this cache
            route(result, &self.state.database, ctx);
        }
        Ok(())
    }
}
