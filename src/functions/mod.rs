//! Reasoning-backed operations
//!
//! [`ExtractObject`] is a plain forward/backward pair: it asks the reasoner
//! for a structured object and, going backward, asks which feedback items
//! belong to which input. [`Generate`] suspends instead, so it can explain the
//! feedback on its output separately for every input once that feedback is
//! complete.

mod extract;
mod generate;


pub use extract::{assign_feedback, Assignment, Assignments, ExtractObject};
pub use generate::Generate;

use crate::autograd::Variable;
use std::collections::HashMap;

/// Keys naming each input in a reasoning request.
///
/// A key is the node name, suffixed with `#<position>` when several inputs
/// share that name, so every input stays addressable.
fn input_keys(inputs: &[Variable]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for input in inputs {
        *counts.entry(input.name()).or_default() += 1;
    }
    inputs
        .iter()
        .enumerate()
        .map(|(position, input)| match counts.get(input.name()) {
            Some(&n) if n > 1 => format!("{}#{position}", input.name()),
            _ => input.name().to_string(),
        })
        .collect()
}

/// Input values for a reasoning request, keyed by [`input_keys`]
fn named_inputs(inputs: &[Variable]) -> serde_json::Map<String, serde_json::Value> {
    input_keys(inputs)
        .into_iter()
        .zip(inputs)
        .map(|(key, input)| (key, input.json()))
        .collect()
}
