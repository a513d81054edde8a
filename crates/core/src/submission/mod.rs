//! Submission records and their storage.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteSubmissionStore;
pub use store::{StatusUpdate, SubmissionError, SubmissionFilter, SubmissionStore};
pub use types::{Submission, SubmissionStatus};
