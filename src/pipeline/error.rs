//! Pipeline error taxonomy.
//!
//! Each variant carries a retryability verdict: parse and extraction
//! failures are deterministic and fatal; store contention, model calls,
//! and validation failures are worth another attempt.

use std::time::Duration;

use thiserror::Error;

use crate::ai::{ExtractorError, ValidationError};
use crate::db::error::DatabaseError;
use crate::email::EmailParseError;
use crate::extract::ExtractError;

/// A failure inside a single pipeline step.
#[derive(Error, Debug)]
pub enum StepError {
    /// The raw message is not processable email. Fatal.
    #[error(transparent)]
    Parse(#[from] EmailParseError),

    /// Candidate text could not be extracted (e.g. unreadable PDF). Fatal:
    /// the bytes will not get better on retry.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// A store operation failed; retryable only for contention and I/O.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The model call failed.
    #[error(transparent)]
    Model(#[from] ExtractorError),

    /// The model responded but violated the schema. Retrying re-invokes
    /// the model, which may produce a conforming answer.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A step depends on state an earlier step should have produced, and
    /// it is gone. Fatal: something outside the pipeline broke an invariant.
    #[error("Missing prerequisite: {what}")]
    MissingPrerequisite { what: &'static str },

    /// The attempt exceeded the per-step deadline.
    #[error("Step timed out after {0:?}")]
    Timeout(Duration),
}

impl StepError {
    pub fn is_retryable(&self) -> bool {
        match self {
            StepError::Parse(_) => false,
            StepError::Extract(_) => false,
            StepError::Database(e) => e.is_retryable(),
            StepError::Model(e) => e.is_retryable(),
            StepError::Validation(_) => true,
            StepError::MissingPrerequisite { .. } => false,
            StepError::Timeout(_) => true,
        }
    }
}

/// A pipeline run failure, attributed to the step that caused it.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Step '{step}' failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: StepError,
    },
}

impl PipelineError {
    /// The name of the step that failed.
    pub fn step_name(&self) -> &'static str {
        match self {
            PipelineError::Step { step, .. } => step,
        }
    }

    /// The underlying step failure.
    pub fn step_error(&self) -> &StepError {
        match self {
            PipelineError::Step { source, .. } => source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ValidationError;

    #[test]
    fn test_parse_errors_are_fatal() {
        let err = StepError::Parse(EmailParseError::MissingMessageId);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_extract_errors_are_fatal() {
        let err = StepError::Extract(ExtractError::PdfLoad("bad xref".into()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_validation_errors_are_retryable() {
        let err = StepError::Validation(ValidationError {
            field: "currencyCode",
            reason: "is missing".into(),
        });
        assert!(err.is_retryable());
    }

    #[test]
    fn test_model_transport_errors_are_retryable() {
        let err = StepError::Model(ExtractorError::Request("connection reset".into()));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_unique_violation_is_not_retryable() {
        let err = StepError::Database(DatabaseError::UniqueViolation("message_id".into()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_timeout_is_retryable() {
        assert!(StepError::Timeout(Duration::from_secs(30)).is_retryable());
    }

    #[test]
    fn test_missing_prerequisite_is_fatal() {
        let err = StepError::MissingPrerequisite {
            what: "ledger entry",
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_pipeline_error_names_step() {
        let err = PipelineError::Step {
            step: "classify",
            source: StepError::Timeout(Duration::from_secs(1)),
        };
        assert_eq!(err.step_name(), "classify");
        assert!(err.to_string().contains("classify"));
    }
}
