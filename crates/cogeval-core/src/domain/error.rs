//! Error taxonomy for evaluation runs.

use std::path::PathBuf;

/// Errors produced while decoding a string-encoded response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("choice separator '|' in {response_type} response {raw:?}")]
    UnexpectedChoiceSeparator { response_type: String, raw: String },
}

/// Errors produced by dataset loading, model loading and evaluation.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("{dataset} dataset is missing required columns: {}", missing.join(", "))]
    Schema {
        dataset: String,
        missing: Vec<String>,
    },

    #[error("expected exactly one model in {path:?}, found {found}")]
    ModelDiscovery { path: PathBuf, found: usize },

    #[error("model {model} is not applicable to domains {}", domains.join(", "))]
    UnsupportedDomain { model: String, domains: Vec<String> },

    #[error("model {model} is not applicable to response types {}", response_types.join(", "))]
    UnsupportedResponseType {
        model: String,
        response_types: Vec<String>,
    },

    #[error("malformed response for subject {subject} at sequence {sequence}: {source}")]
    Decode {
        subject: String,
        sequence: String,
        #[source]
        source: DecodeError,
    },

    #[error("model {model} failed in {hook}: {reason}")]
    ModelHook {
        model: String,
        hook: &'static str,
        reason: String,
    },

    #[error("invalid model manifest {path:?}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    /// Whether this failure only invalidates the model being evaluated.
    ///
    /// Applicability mismatches are recorded against the model and the run
    /// moves on; everything else aborts the run.
    pub fn is_model_scoped(&self) -> bool {
        matches!(
            self,
            EvalError::UnsupportedDomain { .. } | EvalError::UnsupportedResponseType { .. }
        )
    }

    pub(crate) fn hook(model: &str, hook: &'static str, err: anyhow::Error) -> Self {
        EvalError::ModelHook {
            model: model.to_string(),
            hook,
            reason: format!("{:#}", err),
        }
    }
}

/// Result type for evaluation operations.
pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_columns() {
        let err = EvalError::Schema {
            dataset: "test".to_string(),
            missing: vec!["sequence".to_string(), "task".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("test dataset"));
        assert!(msg.contains("sequence, task"));
    }

    #[test]
    fn test_applicability_errors_are_model_scoped() {
        let err = EvalError::UnsupportedDomain {
            model: "m".to_string(),
            domains: vec!["syllogistic".to_string()],
        };
        assert!(err.is_model_scoped());
        assert!(err.to_string().contains("syllogistic"));

        let err = EvalError::UnsupportedResponseType {
            model: "m".to_string(),
            response_types: vec!["multiple-choice".to_string()],
        };
        assert!(err.is_model_scoped());
    }

    #[test]
    fn test_discovery_error_aborts_run() {
        let err = EvalError::ModelDiscovery {
            path: PathBuf::from("models/a.json"),
            found: 2,
        };
        assert!(!err.is_model_scoped());
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn test_decode_error_carries_location() {
        let err = EvalError::Decode {
            subject: "7".to_string(),
            sequence: "3".to_string(),
            source: DecodeError::UnexpectedChoiceSeparator {
                response_type: "single-choice".to_string(),
                raw: "a|b".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("subject 7"));
        assert!(msg.contains("sequence 3"));
        assert!(msg.contains("a|b"));
    }

    #[test]
    fn test_hook_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("bad state").context("predicting");
        let err = EvalError::hook("m", "predict", inner);
        let msg = err.to_string();
        assert!(msg.contains("predict"));
        assert!(msg.contains("bad state"));
    }
}
