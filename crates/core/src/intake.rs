//! Submission intake: persist first, then announce.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::metrics::SUBMISSIONS_CREATED;
use crate::submission::{
    Submission, SubmissionError, SubmissionFilter, SubmissionStatus, SubmissionStore,
};
use crate::transport::Producer;

/// Errors that can occur during intake.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("content must not be empty")]
    EmptyContent,

    #[error(transparent)]
    Store(#[from] SubmissionError),
}

/// Number of submissions in each status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub processing: i64,
    pub passed: i64,
    pub failed: i64,
}

/// Front door for new submissions and read access for the API.
pub struct SubmissionService {
    store: Arc<dyn SubmissionStore>,
    producer: Option<Arc<dyn Producer>>,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn SubmissionStore>) -> Self {
        Self {
            store,
            producer: None,
        }
    }

    pub fn with_producer(mut self, producer: Arc<dyn Producer>) -> Self {
        self.producer = Some(producer);
        self
    }

    pub fn producer_available(&self) -> bool {
        self.producer.as_ref().is_some_and(|p| p.is_available())
    }

    /// Persist a PENDING submission and announce it.
    ///
    /// The record is durable before the producer is called. A failed
    /// announcement is logged and does not fail the request.
    pub async fn create(&self, content: &str) -> Result<Submission, IntakeError> {
        if content.trim().is_empty() {
            return Err(IntakeError::EmptyContent);
        }

        let submission = self.store.create(content)?;
        SUBMISSIONS_CREATED.inc();
        info!("[{}] Submission created", submission.id);

        match &self.producer {
            Some(producer) if producer.is_available() => {
                if let Err(e) = producer.produce(&submission.id, &submission.content).await {
                    warn!(
                        "[{}] Failed to announce submission via {}: {}",
                        submission.id,
                        producer.name(),
                        e
                    );
                }
            }
            Some(producer) => warn!(
                "[{}] {} producer unavailable, submission not announced",
                submission.id,
                producer.name()
            ),
            None => {}
        }

        Ok(submission)
    }

    pub fn get(&self, id: &str) -> Result<Option<Submission>, IntakeError> {
        Ok(self.store.get(id)?)
    }

    /// Submissions matching `filter`, newest first.
    pub fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, IntakeError> {
        Ok(self.store.list(filter)?)
    }

    pub fn count(&self, filter: &SubmissionFilter) -> Result<i64, IntakeError> {
        Ok(self.store.count(filter)?)
    }

    pub fn status_counts(&self) -> Result<StatusCounts, IntakeError> {
        let count = |status| self.count(&SubmissionFilter::new().with_status(status));
        Ok(StatusCounts {
            pending: count(SubmissionStatus::Pending)?,
            processing: count(SubmissionStatus::Processing)?,
            passed: count(SubmissionStatus::Passed)?,
            failed: count(SubmissionStatus::Failed)?,
        })
    }
}
