//! Consumer lifecycle management.
//!
//! Builds the configured transport backend and owns its start/shutdown.

mod manager;
mod types;

pub use manager::ConsumerLifecycle;
pub use types::{LifecycleError, LifecycleStatus};
