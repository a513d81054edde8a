//! The submission processing algorithm.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::metrics::{LEASE_RESETS, PROCESS_OUTCOMES};
use crate::submission::{StatusUpdate, Submission, SubmissionStatus, SubmissionStore};
use crate::validator::ContentValidator;

use super::types::{ProcessOutcome, ProcessorError, DEFAULT_LEASE_TIMEOUT_SECS};

/// Applies the submission state machine for one submission at a time.
///
/// Stateless apart from its collaborators, so one instance is shared by
/// whichever consumer is active.
pub struct SubmissionProcessor {
    store: Arc<dyn SubmissionStore>,
    validator: Arc<dyn ContentValidator>,
    clock: Arc<dyn Clock>,
    lease_timeout: Duration,
}

impl SubmissionProcessor {
    /// Create a processor using the system clock and the default lease timeout.
    pub fn new(store: Arc<dyn SubmissionStore>, validator: Arc<dyn ContentValidator>) -> Self {
        Self {
            store,
            validator,
            clock: Arc::new(SystemClock),
            lease_timeout: Duration::from_secs(DEFAULT_LEASE_TIMEOUT_SECS),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_lease_timeout(mut self, lease_timeout: Duration) -> Self {
        self.lease_timeout = lease_timeout;
        self
    }

    pub fn lease_timeout(&self) -> Duration {
        self.lease_timeout
    }

    /// True when a PROCESSING submission's lease has run out and the next
    /// `process` call would reclaim it.
    pub fn is_lease_expired(&self, submission: &Submission) -> bool {
        submission.status == SubmissionStatus::Processing
            && submission
                .lease_elapsed(self.clock.now())
                .is_some_and(|elapsed| self.lease_expired(elapsed))
    }

    /// Process a submission. Returns true when the delivery can be acknowledged:
    /// the submission was validated, or was safely skipped.
    pub fn process(&self, id: &str, content: &str) -> bool {
        self.process_detailed(id, content).is_settled()
    }

    /// Process a submission and report exactly what happened.
    pub fn process_detailed(&self, id: &str, content: &str) -> ProcessOutcome {
        let outcome = self.run(id, content);
        PROCESS_OUTCOMES.with_label_values(&[outcome.as_str()]).inc();
        outcome
    }

    fn run(&self, id: &str, content: &str) -> ProcessOutcome {
        let submission = match self.store.get(id) {
            Ok(Some(submission)) => submission,
            Ok(None) => {
                warn!("[{}] Submission not found", id);
                return ProcessOutcome::NotFound;
            }
            Err(e) => {
                error!("[{}] Failed to load submission: {}", id, e);
                return ProcessOutcome::Errored;
            }
        };

        let mut status = submission.status;

        if status == SubmissionStatus::Processing {
            let now = self.clock.now();
            match submission.lease_elapsed(now) {
                None => {
                    warn!("[{}] PROCESSING without a lease start, skipping", id);
                    return ProcessOutcome::SkippedInFlight;
                }
                Some(elapsed) if self.lease_expired(elapsed) => {
                    warn!(
                        "[{}] Processing lease expired ({}s), resetting to PENDING for retry",
                        id,
                        elapsed.num_seconds()
                    );
                    match self
                        .store
                        .update_status(id, StatusUpdate::new(SubmissionStatus::Pending))
                    {
                        Ok(Some(_)) => {
                            LEASE_RESETS.inc();
                            status = SubmissionStatus::Pending;
                        }
                        Ok(None) => {
                            warn!("[{}] Submission disappeared during lease reset", id);
                            return ProcessOutcome::NotFound;
                        }
                        Err(e) if e.is_contended() => {
                            info!("[{}] Lease already reclaimed elsewhere, skipping: {}", id, e);
                            return ProcessOutcome::SkippedInFlight;
                        }
                        Err(e) => {
                            error!("[{}] Failed to reset expired lease: {}", id, e);
                            return ProcessOutcome::Errored;
                        }
                    }
                }
                Some(_) => {
                    debug!("[{}] Already being processed, skipping", id);
                    return ProcessOutcome::SkippedInFlight;
                }
            }
        }

        if status != SubmissionStatus::Pending {
            info!("[{}] Already processed (status: {}), skipping", id, status);
            return ProcessOutcome::SkippedTerminal;
        }

        // The claim must land before validation so a crash mid-validation
        // leaves a lease behind instead of a silently pending record.
        match self
            .store
            .update_status(id, StatusUpdate::processing(self.clock.now()))
        {
            Ok(Some(_)) => info!("[{}] Status: PENDING -> PROCESSING", id),
            Ok(None) => {
                warn!("[{}] Submission disappeared before it could be claimed", id);
                return ProcessOutcome::NotFound;
            }
            Err(e) if e.is_contended() => {
                info!("[{}] Claimed by another worker, skipping: {}", id, e);
                return ProcessOutcome::SkippedInFlight;
            }
            Err(e) => return self.fail_closed(id, &e.into()),
        }

        match self.validate_and_record(id, content) {
            Ok(outcome) => outcome,
            Err(e) => self.fail_closed(id, &e),
        }
    }

    fn validate_and_record(&self, id: &str, content: &str) -> Result<ProcessOutcome, ProcessorError> {
        debug!("[{}] Validating content with {}", id, self.validator.name());
        let accepted = self.validator.validate(content)?;

        let (status, outcome) = if accepted {
            (SubmissionStatus::Passed, ProcessOutcome::Passed)
        } else {
            (SubmissionStatus::Failed, ProcessOutcome::Failed)
        };

        self.store
            .update_status(id, StatusUpdate::finished(status, self.clock.now()))?
            .ok_or_else(|| ProcessorError::Vanished(id.to_string()))?;

        info!("[{}] Status: PROCESSING -> {}", id, status);
        Ok(outcome)
    }

    /// Best-effort move to FAILED after an error. If this also fails the
    /// record stays PROCESSING and the lease timeout recovers it.
    fn fail_closed(&self, id: &str, err: &ProcessorError) -> ProcessOutcome {
        error!("[{}] Error during processing: {}", id, err);

        match self.store.get(id) {
            Ok(Some(submission)) if submission.status == SubmissionStatus::Processing => {
                match self.store.update_status(
                    id,
                    StatusUpdate::finished(SubmissionStatus::Failed, self.clock.now()),
                ) {
                    Ok(_) => info!("[{}] Marked as FAILED due to error", id),
                    Err(e) => error!("[{}] Failed to update error status: {}", id, e),
                }
            }
            Ok(_) => {}
            Err(e) => error!("[{}] Failed to update error status: {}", id, e),
        }

        ProcessOutcome::Errored
    }

    fn lease_expired(&self, elapsed: chrono::Duration) -> bool {
        // Negative elapsed time (clock skew) never counts as expired.
        elapsed
            .to_std()
            .map(|elapsed| elapsed > self.lease_timeout)
            .unwrap_or(false)
    }
}
