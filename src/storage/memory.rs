//! In-Memory Store Backend
//!
//! Rows live in an ordered map. Lookup is an exact key hit when there is one,
//! otherwise keys are ranked by how many query tokens they share.

use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{Result, Rows, Store};

/// In-memory row store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: RwLock<BTreeMap<String, serde_json::Value>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `rows`
    pub fn with_rows(rows: Rows) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Copy of every row
    pub fn snapshot(&self) -> Rows {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, serde_json::Value>> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, serde_json::Value>> {
        self.rows.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert(&self, rows: Rows) -> Result<()> {
        self.write().extend(rows);
        Ok(())
    }

    async fn query(&self, query: &str, top_k: usize) -> Result<Vec<(String, serde_json::Value)>> {
        let rows = self.read();
        if top_k == 0 {
            return Ok(Vec::new());
        }
        if let Some(value) = rows.get(query) {
            return Ok(vec![(query.to_string(), value.clone())]);
        }

        let wanted = tokens(query);
        let mut scored: Vec<(usize, &String, &serde_json::Value)> = rows
            .iter()
            .filter_map(|(key, value)| {
                let overlap = tokens(key).intersection(&wanted).count();
                (overlap > 0).then_some((overlap, key, value))
            })
            .collect();
        // Highest overlap first; ties keep key order
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.write().remove(key).is_some())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.read().contains_key(key))
    }

    async fn update(&self, key: &str, value: serde_json::Value) -> Result<Option<serde_json::Value>> {
        let mut rows = self.write();
        match rows.get_mut(key) {
            Some(slot) => Ok(Some(std::mem::replace(slot, value))),
            None => Ok(None),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.read().get(key).cloned())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.read().len())
    }
}
