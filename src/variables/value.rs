//! Leaf values updated by the reasoning capability

use crate::autograd::{feedback_json, Data, Feedback, Variable};
use crate::error::{Error, Result};
use crate::reasoning::{CapabilityError, Reasoner, ReasonerExt, ReasoningRequest};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

const REVISE_TASK: &str = "You are maintaining the DATA, which is an instance of DATATYPE. \
    The ERRATA applies to the DATA. \
    Revise the DATA to resolve the ERRATA. \
    Make sure the revised DATA is an instance of the same DATATYPE.";

/// A JSON-compatible value: text, number, list or record.
///
/// As a parameter, a `Value` applies feedback by asking its reasoner for a
/// revised value of the same JSON kind and replacing its contents.
pub struct Value {
    datatype: String,
    value: RwLock<serde_json::Value>,
    reasoner: Option<Arc<dyn Reasoner>>,
}

#[derive(Deserialize)]
struct UpdatedValue {
    final_value: serde_json::Value,
}

impl Value {
    /// Wrap `value`, described by `datatype`
    pub fn new(datatype: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            datatype: datatype.into(),
            value: RwLock::new(value.into()),
            reasoner: None,
        }
    }

    /// Attach the reasoner used to apply feedback
    #[must_use]
    pub fn with_reasoner(mut self, reasoner: Arc<dyn Reasoner>) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    /// Parameter node holding `value`
    pub fn parameter(
        datatype: impl Into<String>,
        value: impl Into<serde_json::Value>,
        reasoner: Arc<dyn Reasoner>,
    ) -> Variable<Value> {
        Variable::parameter(Self::new(datatype, value).with_reasoner(reasoner))
    }

    /// Constant node holding `value`
    pub fn constant(
        datatype: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Variable<Value> {
        Variable::constant(Self::new(datatype, value))
    }

    /// New value of the same datatype, sharing the reasoner
    pub fn derive(&self, value: impl Into<serde_json::Value>) -> Self {
        Self {
            datatype: self.datatype.clone(),
            value: RwLock::new(value.into()),
            reasoner: self.reasoner.clone(),
        }
    }

    /// Current contents
    pub fn get(&self) -> serde_json::Value {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current contents when they are text
    pub fn as_text(&self) -> Option<String> {
        match &*self.value.read().unwrap_or_else(PoisonError::into_inner) {
            serde_json::Value::String(text) => Some(text.clone()),
            _ => None,
        }
    }

    fn set(&self, value: serde_json::Value) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("datatype", &self.datatype)
            .field("value", &self.get())
            .field("reasoner", &self.reasoner.is_some())
            .finish()
    }
}

#[async_trait]
impl Data for Value {
    fn datatype(&self) -> &str {
        &self.datatype
    }

    fn json(&self) -> serde_json::Value {
        self.get()
    }

    async fn apply_feedback(&self, feedback: &[Feedback]) -> Result<()> {
        if feedback.is_empty() {
            return Ok(());
        }
        let reasoner = self.reasoner.as_ref().ok_or_else(|| {
            Error::application(&self.datatype, "cannot apply feedback without a reasoner")
        })?;

        let current = self.get();
        let request = ReasoningRequest::object(REVISE_TASK)
            .with("DATA", current.clone())
            .with("ERRATA", feedback_json(feedback))
            .with("DATATYPE", self.datatype.clone());
        let update: UpdatedValue = reasoner.query_object(request).await?;

        if !current.is_null() && json_kind(&update.final_value) != json_kind(&current) {
            return Err(CapabilityError::Unparseable(format!(
                "revised {} is a {}, expected a {}",
                self.datatype,
                json_kind(&update.final_value),
                json_kind(&current)
            ))
            .into());
        }

        debug!(datatype = %self.datatype, "value revised");
        self.set(update.final_value);
        Ok(())
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "record",
    }
}
