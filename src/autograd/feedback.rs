//! Feedback payloads
//!
//! Feedback is the textual analogue of a gradient. It is a closed set of
//! kinds so every consumer can match exhaustively: plain text for ordinary
//! values, and errata / change lists / inserts for nodes backed by a store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A correction raised against a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Feedback {
    /// Free-form explanation of what is wrong
    Text(String),

    /// A textual correction scoped to specific rows of a store
    Errata {
        context: BTreeMap<String, serde_json::Value>,
        change: String,
    },

    /// Structured store operations
    Changes(Vec<Change>),

    /// Rows to add to a store
    Insert(BTreeMap<String, serde_json::Value>),
}

impl Feedback {
    /// Plain-text feedback
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Whether this item is only meaningful to a store-backed node
    pub fn is_store_feedback(&self) -> bool {
        !matches!(self, Feedback::Text(_))
    }

    /// JSON rendering used when feedback is handed to the reasoning capability
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Feedback::Text(text) => serde_json::Value::String(text.clone()),
            other => serde_json::to_value(other).unwrap_or(serde_json::Value::Null),
        }
    }
}

impl From<&str> for Feedback {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Feedback {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feedback::Text(text) => f.write_str(text),
            Feedback::Errata { context, change } => {
                write!(f, "errata on {} row(s): {change}", context.len())
            }
            Feedback::Changes(changes) => write!(f, "{} store change(s)", changes.len()),
            Feedback::Insert(rows) => write!(f, "insert {} row(s)", rows.len()),
        }
    }
}

/// Render a feedback list as a JSON array
pub fn feedback_json(items: &[Feedback]) -> serde_json::Value {
    serde_json::Value::Array(items.iter().map(Feedback::to_json).collect())
}

/// A structured store operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Change {
    Update {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        original_data: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        errata: Option<String>,
        corrected_data: serde_json::Value,
    },
    Delete {
        key: String,
    },
    NoChange {
        key: String,
    },
}

impl Change {
    /// Update `key` to `corrected_data`
    pub fn update(key: impl Into<String>, corrected_data: impl Into<serde_json::Value>) -> Self {
        Self::Update {
            key: key.into(),
            original_data: None,
            errata: None,
            corrected_data: corrected_data.into(),
        }
    }

    /// Delete `key`
    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    /// The row this change targets
    pub fn key(&self) -> &str {
        match self {
            Change::Update { key, .. } | Change::Delete { key } | Change::NoChange { key } => key,
        }
    }
}
