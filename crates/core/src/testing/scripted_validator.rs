//! Scripted validator for testing.

use std::sync::{Arc, Mutex, PoisonError};

use crate::validator::{ContentValidator, ValidationError};

#[derive(Debug, Clone)]
enum Verdict {
    Accept,
    Reject,
    Error(String),
}

/// Validator with a fixed, switchable verdict that records what it was asked.
///
/// # Example
///
/// ```rust,ignore
/// use contentgate_core::testing::ScriptedValidator;
///
/// let validator = ScriptedValidator::rejecting();
/// let processor = SubmissionProcessor::new(store, Arc::new(validator.clone()));
///
/// processor.process(&id, "anything");
/// assert_eq!(validator.seen(), vec!["anything".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedValidator {
    verdict: Arc<Mutex<Verdict>>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedValidator {
    fn with_verdict(verdict: Verdict) -> Self {
        Self {
            verdict: Arc::new(Mutex::new(verdict)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Accepts everything.
    pub fn accepting() -> Self {
        Self::with_verdict(Verdict::Accept)
    }

    /// Rejects everything.
    pub fn rejecting() -> Self {
        Self::with_verdict(Verdict::Reject)
    }

    /// Fails every call with an execution error.
    pub fn erroring(message: &str) -> Self {
        Self::with_verdict(Verdict::Error(message.to_string()))
    }

    /// Switch between accepting and rejecting.
    pub fn set_accepting(&self, accept: bool) {
        let verdict = if accept {
            Verdict::Accept
        } else {
            Verdict::Reject
        };
        *self.verdict.lock().unwrap_or_else(PoisonError::into_inner) = verdict;
    }

    /// Contents passed to `validate`, in call order.
    pub fn seen(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ContentValidator for ScriptedValidator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn validate(&self, content: &str) -> Result<bool, ValidationError> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(content.to_string());

        match &*self.verdict.lock().unwrap_or_else(PoisonError::into_inner) {
            Verdict::Accept => Ok(true),
            Verdict::Reject => Ok(false),
            Verdict::Error(message) => Err(ValidationError::Execution(message.clone())),
        }
    }
}
