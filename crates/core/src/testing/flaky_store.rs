//! Failure-injecting store wrapper for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::submission::{
    StatusUpdate, Submission, SubmissionError, SubmissionFilter, SubmissionStatus,
    SubmissionStore,
};

#[derive(Debug, Default)]
struct FlakyState {
    /// Fail before writing, per target status.
    fail_before: HashMap<SubmissionStatus, u32>,
    /// Write, then report failure anyway, per target status.
    fail_after: HashMap<SubmissionStatus, u32>,
    get_failures: u32,
    updates: Vec<(String, StatusUpdate)>,
}

/// Wraps a real store and injects `Database` errors on demand.
///
/// Failures are armed per target status and consumed one call at a time, so a
/// test can, for example, break only the final PASSED write.
///
/// # Example
///
/// ```rust,ignore
/// use contentgate_core::testing::FlakyStore;
///
/// let store = Arc::new(SqliteSubmissionStore::in_memory()?);
/// let flaky = Arc::new(FlakyStore::new(store.clone()));
///
/// // Leave the record stuck in PROCESSING
/// flaky.fail_updates_to(SubmissionStatus::Passed, 1);
/// flaky.fail_updates_to(SubmissionStatus::Failed, 1);
/// ```
pub struct FlakyStore {
    inner: Arc<dyn SubmissionStore>,
    state: Mutex<FlakyState>,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn SubmissionStore>) -> Self {
        Self {
            inner,
            state: Mutex::new(FlakyState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, FlakyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next `times` updates targeting `status` without writing.
    pub fn fail_updates_to(&self, status: SubmissionStatus, times: u32) {
        *self.state().fail_before.entry(status).or_default() += times;
    }

    /// Apply the next `times` updates targeting `status`, then report an error.
    pub fn fail_after_updates_to(&self, status: SubmissionStatus, times: u32) {
        *self.state().fail_after.entry(status).or_default() += times;
    }

    /// Fail the next `times` reads by id.
    pub fn fail_gets(&self, times: u32) {
        self.state().get_failures += times;
    }

    /// Every `update_status` call seen, including failed ones.
    pub fn recorded_updates(&self) -> Vec<(String, StatusUpdate)> {
        self.state().updates.clone()
    }

    fn take(counter: &mut HashMap<SubmissionStatus, u32>, status: SubmissionStatus) -> bool {
        match counter.get_mut(&status) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn injected(action: &str) -> SubmissionError {
        SubmissionError::Database(format!("injected failure: {}", action))
    }
}

impl SubmissionStore for FlakyStore {
    fn create(&self, content: &str) -> Result<Submission, SubmissionError> {
        self.inner.create(content)
    }

    fn get(&self, id: &str) -> Result<Option<Submission>, SubmissionError> {
        {
            let mut state = self.state();
            if state.get_failures > 0 {
                state.get_failures -= 1;
                return Err(Self::injected("get"));
            }
        }
        self.inner.get(id)
    }

    fn update_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<Option<Submission>, SubmissionError> {
        let (fail_before, fail_after) = {
            let mut state = self.state();
            state.updates.push((id.to_string(), update.clone()));
            let before = Self::take(&mut state.fail_before, update.status);
            let after = !before && Self::take(&mut state.fail_after, update.status);
            (before, after)
        };

        if fail_before {
            return Err(Self::injected("update"));
        }

        let result = self.inner.update_status(id, update)?;
        if fail_after {
            return Err(Self::injected("update acknowledgment"));
        }
        Ok(result)
    }

    fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, SubmissionError> {
        self.inner.list(filter)
    }

    fn list_pending(&self) -> Result<Vec<Submission>, SubmissionError> {
        self.inner.list_pending()
    }

    fn count(&self, filter: &SubmissionFilter) -> Result<i64, SubmissionError> {
        self.inner.count(filter)
    }
}
