//! Single-command refinement from YAML configuration

use super::schema::RefineSpec;
use super::validate::validate_config;
use crate::autograd::{apply_loss, backward, sum, Variable};
use crate::error::{Error, Result};
use crate::optim::{FeedbackApplier, Optimizer};
use crate::reasoning::ScriptedReasoner;
use crate::variables::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Outcome of a refinement run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefineReport {
    /// Parameter values after the optimizer step
    pub values: BTreeMap<String, serde_json::Value>,
    /// Parameters whose state was updated
    pub applied: usize,
    /// Reasoning calls made
    pub reasoning_calls: usize,
}

/// Load refinement spec from YAML file (without running it)
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<RefineSpec> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;

    let spec: RefineSpec = serde_yaml::from_str(&yaml_content)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {}", e)))?;

    validate_config(&spec).map_err(|e| Error::ConfigError(format!("Invalid config: {}", e)))?;

    Ok(spec)
}

/// Run one refinement step described by `spec`.
///
/// Every parameter becomes a `Value` leaf. Each feedback entry is attached to
/// its targets through a loss node; the losses are combined, one backward
/// pass runs from the combination, and a single applier step updates the
/// parameters using the configured replay responses.
#[instrument(skip_all, fields(parameters = spec.parameters.len(), feedback = spec.feedback.len()))]
pub async fn refine(spec: &RefineSpec) -> Result<RefineReport> {
    let reasoner = Arc::new(ScriptedReasoner::with_responses(spec.reasoner.replay.clone()));

    let params: BTreeMap<&str, Variable<Value>> = spec
        .parameters
        .iter()
        .map(|p| {
            let value = Value::new(p.datatype.as_str(), p.value.clone()).with_reasoner(reasoner.clone());
            (p.name.as_str(), Variable::leaf(p.name.as_str(), value, true))
        })
        .collect();

    let mut losses = Vec::with_capacity(spec.feedback.len());
    for item in &spec.feedback {
        let targets = item
            .targets
            .iter()
            .map(|t| {
                params
                    .get(t.as_str())
                    .map(|p| p.erase())
                    .ok_or_else(|| Error::ConfigError(format!("unknown feedback target {t}")))
            })
            .collect::<Result<Vec<_>>>()?;
        losses.push(apply_loss(&targets, item.text.as_str()).await?.erase());
    }

    let mut applied = 0;
    if !losses.is_empty() {
        let root = match losses.as_slice() {
            [single] => single.clone(),
            many => sum(many).erase(),
        };
        let mut optimizer =
            FeedbackApplier::from_config(params.values().map(|p| p.erase()), &spec.engine)?;
        let ctx = backward(&root).await?;
        applied = optimizer.step(&ctx).await?;
    }

    let values = params
        .iter()
        .map(|(name, param)| (name.to_string(), param.get()))
        .collect();
    info!(applied, calls = reasoner.call_count(), "refinement finished");

    Ok(RefineReport {
        values,
        applied,
        reasoning_calls: reasoner.call_count(),
    })
}

/// Load, validate and run a refinement config
pub async fn refine_from_yaml<P: AsRef<Path>>(config_path: P) -> Result<RefineReport> {
    let spec = load_config(config_path)?;
    refine(&spec).await
}
