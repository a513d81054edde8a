//! Types for the lifecycle module.

use serde::Serialize;
use thiserror::Error;

use crate::config::TransportBackend;
use crate::transport::TransportError;

/// Errors that can occur while building or starting a transport.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The configured backend was compiled out.
    #[error("transport backend '{0}' is not available in this build")]
    BackendUnavailable(String),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Snapshot of the active transport.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleStatus {
    pub backend: TransportBackend,
    pub consumer_running: bool,
    pub producer_available: bool,
}
