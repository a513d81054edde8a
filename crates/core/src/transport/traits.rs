//! Transport trait definitions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::types::{BrokerMessage, TransportError};

/// Announces new submissions to whichever consumer is active.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Signal that submission `id` is ready for processing.
    async fn produce(&self, id: &str, content: &str) -> Result<(), TransportError>;

    /// Whether `produce` can currently be attempted.
    fn is_available(&self) -> bool;

    /// Flush and release the underlying client.
    async fn close(&self) {}
}

/// Runs the background loop that feeds submissions to the processor.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Connect and spawn the loop. Calling it while running is a no-op.
    async fn start(&self) -> Result<(), TransportError>;

    /// Stop the loop and wait for it to exit. Calling it while stopped is a no-op.
    async fn shutdown(&self);

    fn is_running(&self) -> bool;
}

/// Write side of a message broker.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Publish one message and wait for the broker to acknowledge it.
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    async fn close(&self);
}

/// Read side of a message broker with manual offset management.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Wait up to `timeout` for the next message.
    async fn poll(&self, timeout: Duration) -> Result<Option<BrokerMessage>, TransportError>;

    /// Mark `message` and everything before it in its partition as consumed.
    async fn commit(&self, message: &BrokerMessage) -> Result<(), TransportError>;

    /// Reposition so `message` is delivered again by the next poll.
    async fn rewind(&self, message: &BrokerMessage) -> Result<(), TransportError>;

    async fn close(&self);
}

/// Opens a subscribed [`MessageSource`]; invoked on every consumer start.
pub type SourceConnector =
    Arc<dyn Fn() -> Result<Arc<dyn MessageSource>, TransportError> + Send + Sync>;
