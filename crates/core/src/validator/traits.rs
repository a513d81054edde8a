//! Validator trait definition.

use thiserror::Error;

/// Errors that can occur while validating content.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The rule set itself is unusable (e.g. a pattern that does not compile).
    #[error("invalid validation rule: {0}")]
    InvalidRule(String),

    /// The validator could not reach a verdict.
    #[error("validation failed to execute: {0}")]
    Execution(String),
}

/// Trait for content validators.
///
/// `Ok(true)` accepts the content, `Ok(false)` rejects it. An `Err` means no
/// verdict was reached; the processor fails the submission in that case.
pub trait ContentValidator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn validate(&self, content: &str) -> Result<bool, ValidationError>;
}
