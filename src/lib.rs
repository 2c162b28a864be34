//! # Afinar: feedback propagation over value-flow graphs
//!
//! Afinar is autograd for text. Values produced by reasoning-backed
//! operations remember what they were derived from; natural-language
//! feedback raised against an output is propagated backward through that
//! graph, and each upstream parameter turns the feedback it receives into a
//! new state through its own update hook.
//!
//! ## Architecture
//!
//! - **autograd**: Nodes, operations, the backward driver and modules
//! - **optim**: Optimizers that apply accumulated feedback
//! - **reasoning**: The reasoning capability seam and a replay reasoner
//! - **variables**: Text, number, list and record values
//! - **storage**: Row stores
//! - **database**: Store-backed terminal nodes with typed feedback
//! - **cache**: Copy-on-write caches over values and databases
//! - **functions**: Extraction and generation operations
//! - **config**: Declarative YAML configuration and CLI

pub mod autograd;
pub mod cache;
pub mod config;
pub mod database;
pub mod functions;
pub mod optim;
pub mod reasoning;
pub mod storage;
pub mod variables;

pub mod error;

// Re-export commonly used types
pub use autograd::{backward, Feedback, FeedbackContext, Variable};
pub use error::{Error, Result};
