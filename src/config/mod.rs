//! Declarative YAML configuration
//!
//! A config names the values to refine, the feedback raised against them, and
//! the responses the replay reasoner answers with.
//!
//! # Example
//!
//! ```yaml
//! engine:
//!   max_concurrency: 4
//!
//! logging:
//!   level: info
//!
//! parameters:
//!   - name: greeting
//!     datatype: Story dialogue
//!     value: Hello Luna.
//!
//! feedback:
//!   - targets: [greeting]
//!     text: The name should be Celestia
//!
//! reasoner:
//!   replay:
//!     - final_value: Hello Princess Celestia.
//! ```

mod cli;
mod refine;
mod schema;
mod validate;

#[cfg(test)]
mod tests;

pub use cli::{
    apply_overrides, parse_args, Cli, Command, InfoArgs, OutputFormat, RefineArgs, ValidateArgs,
};
pub use refine::{load_config, refine, refine_from_yaml, RefineReport};
pub use schema::{
    EngineConfig, FeedbackSpec, LoggingConfig, ParameterSpec, ReasonerSpec, RefineSpec,
};
pub use validate::{validate_config, ValidationError};
