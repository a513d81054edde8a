//! Submission processor.
//!
//! Drives a single submission through the state machine:
//! - Claims PENDING records by moving them to PROCESSING (stamping the lease start)
//! - Runs the content validator and records PASSED or FAILED
//! - Reclaims records whose processing lease has expired
//!
//! Every call is safe to repeat. Duplicate deliveries of the same submission
//! either find it terminal, find it inside a live lease, or lose the claim
//! race; all three are skips.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use contentgate_core::{ContentRules, SqliteSubmissionStore, SubmissionProcessor, SubmissionStore};
//!
//! let store = Arc::new(SqliteSubmissionStore::in_memory()?);
//! let processor = SubmissionProcessor::new(store.clone(), Arc::new(ContentRules::default()));
//!
//! let submission = store.create("abcdefgh1i")?;
//! assert!(processor.process(&submission.id, &submission.content));
//! ```

mod runner;
mod types;

pub use runner::SubmissionProcessor;
pub use types::{ProcessOutcome, ProcessorError, DEFAULT_LEASE_TIMEOUT_SECS};
