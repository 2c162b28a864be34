//! Store-backed nodes
//!
//! A [`Database`] is a terminal node whose state lives in a [`Store`]. Its
//! feedback is typed:
//!
//! - [`Feedback::Text`] / [`Feedback::Errata`]: textual corrections. They are
//!   resolved into store changes with a single reasoning call that only sees
//!   the implicated rows; changes to any other row are discarded.
//! - [`Feedback::Changes`]: structured update / delete / no-change lists.
//! - [`Feedback::Insert`]: new rows.
//!
//! Application order is inserts, then updates, then deletes, so no change
//! ever targets a row the same step already removed.


use crate::autograd::{Change, Data, Feedback, Variable};
use crate::error::{Error, Result};
use crate::reasoning::{Reasoner, ReasonerExt, ReasoningRequest};
use crate::storage::{Rows, Store};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const RESOLVE_TASK: &str = "You are maintaining the DATASET with the latest information. \
    A user provided ERRATA to the DATASET. \
    Edit the DATASET to address the ERRATA. \
    Only touch keys that appear in the DATASET.";

/// Changes proposed by the reasoning capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub changes: Vec<Change>,
}

/// Terminal node backed by a row store
pub struct Database {
    datatype: String,
    store: Arc<dyn Store>,
    reasoner: Arc<dyn Reasoner>,
    top_k: usize,
}

impl Database {
    /// Default number of rows a text errata pulls in as context
    pub const DEFAULT_TOP_K: usize = 3;

    pub fn new(datatype: impl Into<String>, store: Arc<dyn Store>, reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            datatype: datatype.into(),
            store,
            reasoner,
            top_k: Self::DEFAULT_TOP_K,
        }
    }

    /// Number of rows an unscoped text errata is matched against
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Parameter node wrapping a new database
    pub fn parameter(
        datatype: impl Into<String>,
        store: Arc<dyn Store>,
        reasoner: Arc<dyn Reasoner>,
    ) -> Variable<Database> {
        Variable::parameter(Self::new(datatype, store, reasoner))
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn insert(&self, rows: Rows) -> Result<()> {
        Ok(self.store.insert(rows).await?)
    }

    pub async fn query(&self, query: &str, top_k: usize) -> Result<Vec<(String, serde_json::Value)>> {
        Ok(self.store.query(query, top_k).await?)
    }

    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.store.get(key).await?)
    }

    pub async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.store.contains(key).await?)
    }

    pub async fn update(&self, key: &str, value: serde_json::Value) -> Result<Option<serde_json::Value>> {
        Ok(self.store.update(key, value).await?)
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.store.delete(key).await?)
    }

    /// Map a change's key onto an existing row: exact match first, otherwise
    /// the best query hit.
    async fn resolve_key(&self, key: &str) -> Result<Option<String>> {
        if self.store.contains(key).await? {
            return Ok(Some(key.to_string()));
        }
        Ok(self
            .store
            .query(key, 1)
            .await?
            .into_iter()
            .next()
            .map(|(found, _)| found))
    }

    /// Turn textual errata into changes over the implicated rows only
    async fn resolve_errata(&self, errata: Vec<String>, mut context: Rows) -> Result<Vec<Change>> {
        if context.is_empty() {
            warn!(
                database = %self.datatype,
                errata = errata.len(),
                "errata implicate no stored rows; dropping"
            );
            return Ok(Vec::new());
        }

        let request = ReasoningRequest::object(RESOLVE_TASK)
            .with("ERRATA", serde_json::to_value(&errata)?)
            .with("DATASET", serde_json::to_value(&context)?);
        let proposed: ChangeSet = self.reasoner.query_object(request).await?;

        let mut accepted = Vec::new();
        for change in proposed.changes {
            if !context.contains_key(change.key()) {
                warn!(
                    database = %self.datatype,
                    key = %change.key(),
                    "proposed change outside the implicated rows; dropping"
                );
                continue;
            }
            if let Change::Delete { key } = &change {
                // A row is deleted at most once
                context.remove(key);
            }
            accepted.push(change);
        }
        Ok(accepted)
    }

    async fn apply(&self, feedback: &[Feedback]) -> Result<()> {
        let mut errata: Vec<String> = Vec::new();
        let mut context = Rows::new();
        let mut changes: Vec<(String, Change)> = Vec::new();
        let mut inserts: Vec<Rows> = Vec::new();

        for item in feedback {
            match item {
                Feedback::Text(text) => {
                    for (key, value) in self.store.query(text, self.top_k).await? {
                        context.insert(key, value);
                    }
                    errata.push(text.clone());
                }
                Feedback::Errata { context: rows, change } => {
                    context.extend(rows.clone());
                    errata.push(change.clone());
                }
                Feedback::Changes(list) => {
                    for change in list {
                        match self.resolve_key(change.key()).await? {
                            Some(key) => changes.push((key, change.clone())),
                            None => warn!(
                                database = %self.datatype,
                                key = %change.key(),
                                "change targets no stored row; dropping"
                            ),
                        }
                    }
                }
                Feedback::Insert(rows) => inserts.push(rows.clone()),
            }
        }

        if !errata.is_empty() {
            for change in self.resolve_errata(errata, context).await? {
                changes.push((change.key().to_string(), change));
            }
        }

        let inserted: usize = inserts.iter().map(Rows::len).sum();
        for rows in inserts {
            self.store.insert(rows).await?;
        }

        let mut updated = 0;
        for (key, change) in &changes {
            if let Change::Update { corrected_data, .. } = change {
                self.store.update(key, corrected_data.clone()).await?;
                updated += 1;
            }
        }

        let mut deleted = 0;
        for (key, change) in &changes {
            if let Change::Delete { .. } = change {
                if self.store.delete(key).await? {
                    deleted += 1;
                }
            }
        }

        debug!(database = %self.datatype, inserted, updated, deleted, "database feedback applied");
        Ok(())
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("datatype", &self.datatype)
            .field("top_k", &self.top_k)
            .finish()
    }
}

#[async_trait]
impl Data for Database {
    fn datatype(&self) -> &str {
        &self.datatype
    }

    fn json(&self) -> serde_json::Value {
        serde_json::json!({ "database": self.datatype })
    }

    async fn apply_feedback(&self, feedback: &[Feedback]) -> Result<()> {
        if feedback.is_empty() {
            return Ok(());
        }
        self.apply(feedback).await.map_err(|e| match e {
            Error::Storage(inner) => Error::application(&self.datatype, inner),
            other => other,
        })
    }
}
