//! Submission storage trait and types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::submission::{Submission, SubmissionStatus};

/// Error type for submission storage operations.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Requested status change is not an edge of the state machine.
    #[error("Cannot move submission {id} from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: SubmissionStatus,
        to: SubmissionStatus,
    },

    /// Another writer changed the record between read and write.
    #[error("Submission {id} changed concurrently (expected {expected})")]
    Conflict {
        id: String,
        expected: SubmissionStatus,
    },

    /// An update omitted the timestamp the target status requires.
    #[error("Moving submission {id} to {status} requires a timestamp")]
    MissingTimestamp { id: String, status: SubmissionStatus },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl SubmissionError {
    /// True when the update lost a race or targeted a state another worker
    /// already moved the record out of.
    pub fn is_contended(&self) -> bool {
        matches!(
            self,
            SubmissionError::InvalidTransition { .. } | SubmissionError::Conflict { .. }
        )
    }
}

/// A status change with the timestamps it stamps.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: SubmissionStatus,
    /// Set on terminal transitions. Never overwrites an existing value.
    pub processed_at: Option<DateTime<Utc>>,
    /// Set when entering PROCESSING.
    pub processing_started_at: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    /// Update to `status` without touching timestamps.
    pub fn new(status: SubmissionStatus) -> Self {
        Self {
            status,
            processed_at: None,
            processing_started_at: None,
        }
    }

    /// Claim a pending submission, starting its lease at `started_at`.
    pub fn processing(started_at: DateTime<Utc>) -> Self {
        Self::new(SubmissionStatus::Processing).with_processing_started_at(started_at)
    }

    /// Finish a submission with `status` at `processed_at`.
    pub fn finished(status: SubmissionStatus, processed_at: DateTime<Utc>) -> Self {
        Self::new(status).with_processed_at(processed_at)
    }

    pub fn with_processed_at(mut self, at: DateTime<Utc>) -> Self {
        self.processed_at = Some(at);
        self
    }

    pub fn with_processing_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.processing_started_at = Some(at);
        self
    }
}

/// Filter for querying submissions.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    /// Filter by status.
    pub status: Option<SubmissionStatus>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl SubmissionFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by status.
    pub fn with_status(mut self, status: SubmissionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for submission storage backends.
///
/// Every method is atomic with respect to a single submission id.
pub trait SubmissionStore: Send + Sync {
    /// Persist a new PENDING submission with a freshly generated id.
    fn create(&self, content: &str) -> Result<Submission, SubmissionError>;

    /// Get a submission by id.
    fn get(&self, id: &str) -> Result<Option<Submission>, SubmissionError>;

    /// Apply a status change if the current status allows it.
    ///
    /// Returns `Ok(None)` if the submission does not exist.
    fn update_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<Option<Submission>, SubmissionError>;

    /// List submissions matching the filter, newest first.
    fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, SubmissionError>;

    /// All PENDING submissions, oldest first.
    fn list_pending(&self) -> Result<Vec<Submission>, SubmissionError>;

    /// Count submissions matching the filter (limit/offset ignored).
    fn count(&self, filter: &SubmissionFilter) -> Result<i64, SubmissionError>;
}
