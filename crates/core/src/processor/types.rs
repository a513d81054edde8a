//! Types for the processor module.

use serde::Serialize;
use thiserror::Error;

use crate::submission::SubmissionError;
use crate::validator::ValidationError;

/// How long a submission may stay PROCESSING before another delivery may
/// reclaim it.
pub const DEFAULT_LEASE_TIMEOUT_SECS: u64 = 300;

/// Errors raised after a submission has been claimed.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Submission store error.
    #[error("submission store error: {0}")]
    Store(#[from] SubmissionError),

    /// Validator error.
    #[error("validator error: {0}")]
    Validation(#[from] ValidationError),

    /// The record was removed while it was being processed.
    #[error("submission disappeared during processing: {0}")]
    Vanished(String),
}

/// Result of one processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Validated and recorded as PASSED.
    Passed,
    /// Validated and recorded as FAILED.
    Failed,
    /// Another delivery holds a live lease, or won the claim.
    SkippedInFlight,
    /// Already PASSED or FAILED.
    SkippedTerminal,
    /// No record with that id.
    NotFound,
    /// A store or validator error interrupted processing.
    Errored,
}

impl ProcessOutcome {
    /// Whether the delivery that triggered this attempt can be acknowledged.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            ProcessOutcome::Passed
                | ProcessOutcome::Failed
                | ProcessOutcome::SkippedInFlight
                | ProcessOutcome::SkippedTerminal
        )
    }

    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessOutcome::Passed => "passed",
            ProcessOutcome::Failed => "failed",
            ProcessOutcome::SkippedInFlight | ProcessOutcome::SkippedTerminal => "skipped",
            ProcessOutcome::NotFound => "not_found",
            ProcessOutcome::Errored => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_outcomes() {
        assert!(ProcessOutcome::Passed.is_settled());
        assert!(ProcessOutcome::Failed.is_settled());
        assert!(ProcessOutcome::SkippedInFlight.is_settled());
        assert!(ProcessOutcome::SkippedTerminal.is_settled());
        assert!(!ProcessOutcome::NotFound.is_settled());
        assert!(!ProcessOutcome::Errored.is_settled());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(ProcessOutcome::SkippedInFlight.as_str(), "skipped");
        assert_eq!(ProcessOutcome::SkippedTerminal.as_str(), "skipped");
        assert_eq!(ProcessOutcome::NotFound.as_str(), "not_found");
        assert_eq!(ProcessOutcome::Errored.as_str(), "error");
    }

    #[test]
    fn test_error_from_store_error() {
        let err: ProcessorError = SubmissionError::Database("locked".to_string()).into();
        assert!(matches!(err, ProcessorError::Store(_)));
        assert_eq!(
            err.to_string(),
            "submission store error: Database error: locked"
        );
    }
}
