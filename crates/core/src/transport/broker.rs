//! Broker-backed producer and consumer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::BrokerConfig;
use crate::metrics::{BROKER_COMMITS, BROKER_PUBLISHES, BROKER_REDELIVERIES};
use crate::processor::SubmissionProcessor;

use super::task::LoopHandle;
use super::traits::{Consumer, MessageSink, MessageSource, Producer, SourceConnector};
use super::types::{BrokerMessage, SubmissionEvent, TransportError};

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Publishes `{id, content}` keyed by submission id.
pub struct BrokerProducer {
    sink: Arc<dyn MessageSink>,
    topic: String,
    retries: u32,
    publish_timeout: Duration,
    retry_delay: Duration,
}

impl BrokerProducer {
    pub fn new(sink: Arc<dyn MessageSink>, config: &BrokerConfig) -> Self {
        Self {
            sink,
            topic: config.topic.clone(),
            retries: config.publish_retries,
            publish_timeout: config.publish_timeout(),
            retry_delay: config.retry_backoff(),
        }
    }
}

#[async_trait]
impl Producer for BrokerProducer {
    fn name(&self) -> &str {
        "broker"
    }

    async fn produce(&self, id: &str, content: &str) -> Result<(), TransportError> {
        let payload = SubmissionEvent::new(id, content).encode()?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .sink
                .publish(&self.topic, id, &payload, self.publish_timeout)
                .await
            {
                Ok(()) => {
                    BROKER_PUBLISHES.with_label_values(&["success"]).inc();
                    info!("[{}] Published to topic {}", id, self.topic);
                    return Ok(());
                }
                Err(e) if attempt <= self.retries => {
                    BROKER_PUBLISHES.with_label_values(&["retry"]).inc();
                    warn!(
                        "[{}] Publish attempt {}/{} failed: {}",
                        id,
                        attempt,
                        self.retries + 1,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    BROKER_PUBLISHES.with_label_values(&["failure"]).inc();
                    error!("[{}] Publish failed after {} attempts: {}", id, attempt, e);
                    return Err(e);
                }
            }
        }
    }

    fn is_available(&self) -> bool {
        self.sink.is_connected()
    }

    async fn close(&self) {
        self.sink.close().await;
        info!("Broker producer closed");
    }
}

struct RunningSource {
    handle: LoopHandle,
    source: Arc<dyn MessageSource>,
}

/// Consumes submission events and commits each offset only after the
/// processor settles the submission.
pub struct BrokerConsumer {
    connector: SourceConnector,
    processor: Arc<SubmissionProcessor>,
    poll_timeout: Duration,
    retry_backoff: Duration,
    shutdown_grace: Duration,
    running: Mutex<Option<RunningSource>>,
}

impl BrokerConsumer {
    pub fn new(
        connector: SourceConnector,
        processor: Arc<SubmissionProcessor>,
        config: &BrokerConfig,
    ) -> Self {
        Self {
            connector,
            processor,
            poll_timeout: config.poll_timeout(),
            retry_backoff: config.retry_backoff(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            running: Mutex::new(None),
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    fn state(&self) -> MutexGuard<'_, Option<RunningSource>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn consume_loop(
        source: Arc<dyn MessageSource>,
        processor: Arc<SubmissionProcessor>,
        poll_timeout: Duration,
        retry_backoff: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!("Broker consumer loop started");
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Broker consumer loop received shutdown signal");
                    break;
                }
                polled = source.poll(poll_timeout) => {
                    let back_off = match polled {
                        Ok(Some(message)) => {
                            Self::handle_message(source.as_ref(), &processor, message).await
                        }
                        Ok(None) => false,
                        Err(e) => {
                            warn!("Broker poll error: {}", e);
                            true
                        }
                    };

                    if back_off {
                        tokio::select! {
                            _ = shutdown_rx.recv() => {
                                info!("Broker consumer loop received shutdown signal");
                                break;
                            }
                            _ = tokio::time::sleep(retry_backoff) => {}
                        }
                    }
                }
            }
            tokio::task::yield_now().await;
        }
        info!("Broker consumer loop stopped");
    }

    /// Returns true when the loop should back off before polling again.
    async fn handle_message(
        source: &dyn MessageSource,
        processor: &SubmissionProcessor,
        message: BrokerMessage,
    ) -> bool {
        let event = match SubmissionEvent::decode(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    "Skipping malformed message at {}/{}@{}: {}",
                    message.topic, message.partition, message.offset, e
                );
                if let Err(e) = source.commit(&message).await {
                    warn!("Failed to commit past malformed message: {}", e);
                }
                return false;
            }
        };

        debug!(
            "[{}] Received message {}/{}@{}",
            event.id, message.topic, message.partition, message.offset
        );

        if processor.process(&event.id, &event.content) {
            match source.commit(&message).await {
                Ok(()) => BROKER_COMMITS.inc(),
                Err(e) => warn!("[{}] Failed to commit offset: {}", event.id, e),
            }
            false
        } else {
            BROKER_REDELIVERIES.inc();
            warn!(
                "[{}] Processing did not complete, message will be redelivered",
                event.id
            );
            if let Err(e) = source.rewind(&message).await {
                warn!("[{}] Failed to rewind for redelivery: {}", event.id, e);
            }
            true
        }
    }
}

#[async_trait]
impl Consumer for BrokerConsumer {
    fn name(&self) -> &str {
        "broker"
    }

    async fn start(&self) -> Result<(), TransportError> {
        let stale = {
            let mut state = self.state();
            if state.as_ref().is_some_and(|r| !r.handle.is_finished()) {
                warn!("Broker consumer already running");
                return Ok(());
            }
            state.take()
        };
        if let Some(RunningSource { source, .. }) = stale {
            warn!("Previous broker consumer loop exited, closing its subscription");
            source.close().await;
        }

        let source = (self.connector)()?;

        let handle = LoopHandle::spawn({
            let source = Arc::clone(&source);
            let processor = Arc::clone(&self.processor);
            let poll_timeout = self.poll_timeout;
            let retry_backoff = self.retry_backoff;
            move |shutdown_rx| {
                Self::consume_loop(source, processor, poll_timeout, retry_backoff, shutdown_rx)
            }
        });

        *self.state() = Some(RunningSource { handle, source });
        info!("Broker consumer started");
        Ok(())
    }

    async fn shutdown(&self) {
        let running = self.state().take();
        let Some(RunningSource { handle, source }) = running else {
            warn!("Broker consumer not running");
            return;
        };

        handle.stop(self.shutdown_grace).await;
        source.close().await;
        info!("Broker consumer shut down");
    }

    fn is_running(&self) -> bool {
        self.state()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }
}
