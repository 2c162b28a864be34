//! Configuration validation

use super::schema::RefineSpec;
use std::collections::HashSet;

/// Validation error type
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("No parameters to refine")]
    NoParameters,

    #[error("Parameter name must not be empty")]
    EmptyParameterName,

    #[error("Duplicate parameter name: {0}")]
    DuplicateParameter(String),

    #[error("Feedback #{0} has no targets")]
    NoTargets(usize),

    #[error("Feedback #{0} has empty text")]
    EmptyFeedback(usize),

    #[error("Feedback #{index} targets unknown parameter: {target}")]
    UnknownTarget { index: usize, target: String },

    #[error("Invalid max_concurrency: {0} (must be > 0)")]
    InvalidConcurrency(usize),

    #[error("Invalid log level: {0} (must be one of: error, warn, info, debug, trace)")]
    InvalidLogLevel(String),
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Validate a refinement specification
///
/// Checks:
/// - At least one parameter, names unique and non-empty
/// - Every feedback entry has text and names known parameters
/// - Engine and logging settings are in range
pub fn validate_config(spec: &RefineSpec) -> Result<(), ValidationError> {
    if spec.parameters.is_empty() {
        return Err(ValidationError::NoParameters);
    }

    let mut names = HashSet::new();
    for param in &spec.parameters {
        if param.name.trim().is_empty() {
            return Err(ValidationError::EmptyParameterName);
        }
        if !names.insert(param.name.as_str()) {
            return Err(ValidationError::DuplicateParameter(param.name.clone()));
        }
    }

    for (index, item) in spec.feedback.iter().enumerate() {
        if item.targets.is_empty() {
            return Err(ValidationError::NoTargets(index));
        }
        if item.text.trim().is_empty() {
            return Err(ValidationError::EmptyFeedback(index));
        }
        if let Some(target) = item.targets.iter().find(|t| !names.contains(t.as_str())) {
            return Err(ValidationError::UnknownTarget {
                index,
                target: target.clone(),
            });
        }
    }

    if spec.engine.max_concurrency == 0 {
        return Err(ValidationError::InvalidConcurrency(spec.engine.max_concurrency));
    }

    if !LOG_LEVELS.contains(&spec.logging.level.to_lowercase().as_str()) {
        return Err(ValidationError::InvalidLogLevel(spec.logging.level.clone()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{FeedbackSpec, ParameterSpec};
    use serde_json::json;

    fn spec() -> RefineSpec {
        serde_yaml::from_str(
            r#"
parameters:
  - name: greeting
    value: Hello Luna.
feedback:
  - targets: [greeting]
    text: The name should be Celestia
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_spec() {
        assert_eq!(validate_config(&spec()), Ok(()));
    }

    #[test]
    fn test_no_parameters() {
        let mut s = spec();
        s.parameters.clear();
        s.feedback.clear();
        assert_eq!(validate_config(&s), Err(ValidationError::NoParameters));
    }

    #[test]
    fn test_duplicate_parameter() {
        let mut s = spec();
        s.parameters.push(ParameterSpec {
            name: "greeting".to_string(),
            datatype: "Text".to_string(),
            value: json!("again"),
        });
        assert_eq!(
            validate_config(&s),
            Err(ValidationError::DuplicateParameter("greeting".to_string()))
        );
    }

    #[test]
    fn test_unknown_target() {
        let mut s = spec();
        s.feedback.push(FeedbackSpec {
            targets: vec!["farewell".to_string()],
            text: "Say goodbye".to_string(),
        });
        assert_eq!(
            validate_config(&s),
            Err(ValidationError::UnknownTarget {
                index: 1,
                target: "farewell".to_string()
            })
        );
    }

    #[test]
    fn test_empty_feedback_text() {
        let mut s = spec();
        s.feedback[0].text = "  ".to_string();
        assert_eq!(validate_config(&s), Err(ValidationError::EmptyFeedback(0)));
    }

    #[test]
    fn test_zero_concurrency() {
        let mut s = spec();
        s.engine.max_concurrency = 0;
        assert_eq!(validate_config(&s), Err(ValidationError::InvalidConcurrency(0)));
    }

    #[test]
    fn test_bad_log_level() {
        let mut s = spec();
        s.logging.level = "loud".to_string();
        assert!(matches!(
            validate_config(&s),
            Err(ValidationError::InvalidLogLevel(_))
        ));
    }
}
