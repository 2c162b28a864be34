//! Integration tests for config module

use super::*;
use crate::Error;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

const GREETING: &str = r#"
engine:
  max_concurrency: 2

logging:
  level: debug

parameters:
  - name: greeting
    datatype: Story dialogue
    value: Hello Luna.
  - name: farewell
    value: Goodbye.

feedback:
  - targets: [greeting]
    text: The name should be Celestia
  - targets: [greeting]
    text: They should be addressed as Princess

reasoner:
  replay:
    - final_value: Hello Princess Celestia.
"#;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(yaml.as_bytes()).unwrap();
    temp_file
}

#[test]
fn test_end_to_end_config_loading() {
    let temp_file = write_config(GREETING);

    let spec = load_config(temp_file.path()).unwrap();

    assert_eq!(spec.engine.max_concurrency, 2);
    assert_eq!(spec.logging.level, "debug");
    assert_eq!(spec.parameters.len(), 2);
    assert_eq!(spec.parameters[1].datatype, "Text");
    assert_eq!(spec.feedback.len(), 2);
    assert_eq!(spec.reasoner.replay.len(), 1);
}

#[test]
fn test_invalid_config_rejected() {
    let temp_file = write_config(
        r#"
parameters:
  - name: greeting
    value: Hello Luna.
feedback:
  - targets: [nobody]
    text: Who is this for?
"#,
    );

    let err = load_config(temp_file.path()).unwrap_err();
    assert!(matches!(err, Error::ConfigError(msg) if msg.contains("nobody")));
}

#[test]
fn test_missing_file_rejected() {
    let err = load_config("/nonexistent/afinar.yaml").unwrap_err();
    assert!(matches!(err, Error::ConfigError(_)));
}

#[tokio::test]
async fn test_refine_from_yaml() {
    let temp_file = write_config(GREETING);

    let report = refine_from_yaml(temp_file.path()).await.unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(report.reasoning_calls, 1);
    assert_eq!(report.values["greeting"], json!("Hello Princess Celestia."));
    assert_eq!(report.values["farewell"], json!("Goodbye."));
}

#[tokio::test]
async fn test_refine_without_feedback_changes_nothing() {
    let temp_file = write_config(
        r#"
parameters:
  - name: greeting
    value: Hello Luna.
"#,
    );

    let report = refine_from_yaml(temp_file.path()).await.unwrap();

    assert_eq!(report.applied, 0);
    assert_eq!(report.reasoning_calls, 0);
    assert_eq!(report.values["greeting"], json!("Hello Luna."));
}

#[tokio::test]
async fn test_refine_exhausted_replay_fails() {
    let mut spec: RefineSpec = serde_yaml::from_str(GREETING).unwrap();
    spec.reasoner.replay.clear();

    let err = refine(&spec).await.unwrap_err();
    assert!(matches!(err, Error::Capability(_)));
}
