//! In-memory broker for testing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::transport::{
    BrokerMessage, MessageSink, MessageSource, SourceConnector, TransportError,
};

#[derive(Debug, Default)]
struct BrokerState {
    log: Vec<BrokerMessage>,
    /// Next offset a new subscription starts from.
    committed: i64,
    /// Next offset the current subscription delivers.
    position: i64,
    delivered: Vec<i64>,
    publish_failures: u32,
    connect_failures: u32,
    connects: u32,
    sink_closed: bool,
    source_closed: bool,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<BrokerState>,
    published: Notify,
}

/// Single-partition broker with consumer-group offset semantics.
///
/// Implements both [`MessageSink`] and [`MessageSource`]. Like a real consumer
/// group, a new subscription (via [`InMemoryBroker::connector`]) resumes at
/// the last committed offset, so uncommitted messages are delivered again.
/// Clones share the same log.
///
/// # Example
///
/// ```rust,ignore
/// use contentgate_core::testing::InMemoryBroker;
///
/// let broker = InMemoryBroker::new();
/// let producer = BrokerProducer::new(Arc::new(broker.clone()), &config);
/// let consumer = BrokerConsumer::new(broker.connector(), processor, &config);
///
/// consumer.start().await?;
/// producer.produce(&id, &content).await?;
/// assert!(broker.wait_for_committed(1, Duration::from_secs(5)).await);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connector opening a new subscription at the committed offset.
    pub fn connector(&self) -> SourceConnector {
        let broker = self.clone();
        Arc::new(move || {
            let mut state = broker.state();
            if state.connect_failures > 0 {
                state.connect_failures -= 1;
                return Err(TransportError::Connection(
                    "injected connect failure".to_string(),
                ));
            }
            state.position = state.committed;
            state.source_closed = false;
            state.connects += 1;
            drop(state);
            Ok(Arc::new(broker.clone()) as Arc<dyn MessageSource>)
        })
    }

    /// Fail the next `times` publishes.
    pub fn fail_publishes(&self, times: u32) {
        self.state().publish_failures += times;
    }

    /// Fail the next connection attempt.
    pub fn fail_next_connect(&self) {
        self.state().connect_failures += 1;
    }

    /// Everything published so far.
    pub fn messages(&self) -> Vec<BrokerMessage> {
        self.state().log.clone()
    }

    /// Offsets handed out by `poll`, in delivery order.
    pub fn delivered_offsets(&self) -> Vec<i64> {
        self.state().delivered.clone()
    }

    /// Next offset a new subscription would start from.
    pub fn committed_offset(&self) -> i64 {
        self.state().committed
    }

    pub fn connects(&self) -> u32 {
        self.state().connects
    }

    pub fn is_source_closed(&self) -> bool {
        self.state().source_closed
    }

    /// Wait until the committed offset reaches `offset`. Returns false on timeout.
    pub async fn wait_for_committed(&self, offset: i64, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.committed_offset() >= offset {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.committed_offset() >= offset
    }

    fn next_message(&self) -> Result<Option<BrokerMessage>, TransportError> {
        let mut state = self.state();
        if state.source_closed {
            return Err(TransportError::Consume("subscription closed".to_string()));
        }
        let Some(message) = state.log.get(state.position as usize).cloned() else {
            return Ok(None);
        };
        state.position += 1;
        state.delivered.push(message.offset);
        Ok(Some(message))
    }
}

#[async_trait]
impl MessageSink for InMemoryBroker {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
        _timeout: Duration,
    ) -> Result<(), TransportError> {
        {
            let mut state = self.state();
            if state.sink_closed {
                return Err(TransportError::Unavailable("producer closed".to_string()));
            }
            if state.publish_failures > 0 {
                state.publish_failures -= 1;
                return Err(TransportError::Publish("injected publish failure".to_string()));
            }
            let offset = state.log.len() as i64;
            state.log.push(BrokerMessage {
                topic: topic.to_string(),
                partition: 0,
                offset,
                key: Some(key.to_string()),
                payload: payload.to_vec(),
            });
        }
        self.inner.published.notify_waiters();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.state().sink_closed
    }

    async fn close(&self) {
        self.state().sink_closed = true;
    }
}

#[async_trait]
impl MessageSource for InMemoryBroker {
    async fn poll(&self, timeout: Duration) -> Result<Option<BrokerMessage>, TransportError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Registered before checking the log so a publish in between is not missed.
            let published = self.inner.published.notified();
            if let Some(message) = self.next_message()? {
                return Ok(Some(message));
            }
            if tokio::time::timeout_at(deadline, published).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn commit(&self, message: &BrokerMessage) -> Result<(), TransportError> {
        let mut state = self.state();
        state.committed = state.committed.max(message.offset + 1);
        Ok(())
    }

    async fn rewind(&self, message: &BrokerMessage) -> Result<(), TransportError> {
        self.state().position = message.offset;
        Ok(())
    }

    async fn close(&self) {
        self.state().source_closed = true;
    }
}
