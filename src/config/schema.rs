//! YAML schema definitions for declarative refinement runs

use crate::reasoning::Generation;
use serde::{Deserialize, Serialize};

/// Complete refinement specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineSpec {
    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Values to refine
    pub parameters: Vec<ParameterSpec>,

    /// Feedback raised against the parameters
    #[serde(default)]
    pub feedback: Vec<FeedbackSpec>,

    /// Reasoning capability settings
    #[serde(default)]
    pub reasoner: ReasonerSpec,
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Parameters updated concurrently by one optimizer step
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_concurrency(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level; `RUST_LOG` takes precedence
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// A refinable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Unique name, used as the node name and as a feedback target
    pub name: String,

    /// Description of what the value is
    #[serde(default = "default_datatype")]
    pub datatype: String,

    /// Initial contents
    pub value: serde_json::Value,
}

/// Feedback raised against one or more parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSpec {
    /// Parameter names
    pub targets: Vec<String>,

    /// What should change
    pub text: String,
}

/// Reasoning capability settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasonerSpec {
    /// Responses replayed in order. Strings are text responses, anything else
    /// is a structured response.
    #[serde(default)]
    pub replay: Vec<Generation>,
}

fn default_concurrency() -> usize {
    4
}

fn default_level() -> String {
    "info".to_string()
}

fn default_datatype() -> String {
    "Text".to_string()
}
