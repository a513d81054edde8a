//! Consumer lifecycle manager implementation.

use std::sync::Arc;

use tracing::info;

use crate::clock::Clock;
use crate::config::{Config, TransportBackend};
use crate::metrics::CONSUMER_RUNNING;
use crate::processor::SubmissionProcessor;
use crate::submission::SubmissionStore;
use crate::transport::{
    BrokerConsumer, BrokerProducer, Consumer, MessageSink, PollConsumer, PollProducer, Producer,
    SourceConnector,
};
use crate::validator::ContentValidator;

use super::types::{LifecycleError, LifecycleStatus};

/// Owns the producer/consumer pair of exactly one transport backend.
///
/// Constructed explicitly at startup and handed to whoever needs it; there is
/// no global instance.
pub struct ConsumerLifecycle {
    backend: TransportBackend,
    producer: Arc<dyn Producer>,
    consumer: Arc<dyn Consumer>,
}

impl ConsumerLifecycle {
    pub fn new(
        backend: TransportBackend,
        producer: Arc<dyn Producer>,
        consumer: Arc<dyn Consumer>,
    ) -> Self {
        Self {
            backend,
            producer,
            consumer,
        }
    }

    /// Build the backend selected by `processor.backend`.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn SubmissionStore>,
        validator: Arc<dyn ContentValidator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LifecycleError> {
        let processor = Arc::new(
            SubmissionProcessor::new(Arc::clone(&store), validator)
                .with_clock(clock)
                .with_lease_timeout(config.processor.lease_timeout()),
        );

        info!(
            "Using {} transport backend (lease timeout {}s)",
            config.processor.backend.as_str(),
            config.processor.lease_timeout_secs
        );

        match config.processor.backend {
            TransportBackend::Poll => Ok(Self::poll(config, store, processor)),
            TransportBackend::Broker => Self::kafka(config, processor),
        }
    }

    /// Poll backend over `store`.
    pub fn poll(
        config: &Config,
        store: Arc<dyn SubmissionStore>,
        processor: Arc<SubmissionProcessor>,
    ) -> Self {
        let consumer = PollConsumer::new(store, processor, config.processor.poll_interval())
            .with_shutdown_grace(config.processor.shutdown_grace());
        Self::new(
            TransportBackend::Poll,
            Arc::new(PollProducer::new()),
            Arc::new(consumer),
        )
    }

    /// Broker backend over an arbitrary sink and source.
    pub fn broker(
        config: &Config,
        processor: Arc<SubmissionProcessor>,
        sink: Arc<dyn MessageSink>,
        connector: SourceConnector,
    ) -> Self {
        let producer = BrokerProducer::new(sink, &config.broker);
        let consumer = BrokerConsumer::new(connector, processor, &config.broker)
            .with_shutdown_grace(config.processor.shutdown_grace());
        Self::new(
            TransportBackend::Broker,
            Arc::new(producer),
            Arc::new(consumer),
        )
    }

    #[cfg(feature = "kafka")]
    fn kafka(
        config: &Config,
        processor: Arc<SubmissionProcessor>,
    ) -> Result<Self, LifecycleError> {
        use crate::transport::{KafkaSink, KafkaSource};

        let sink = KafkaSink::connect(&config.broker)?;
        Ok(Self::broker(
            config,
            processor,
            Arc::new(sink),
            KafkaSource::connector(&config.broker),
        ))
    }

    #[cfg(not(feature = "kafka"))]
    fn kafka(
        _config: &Config,
        _processor: Arc<SubmissionProcessor>,
    ) -> Result<Self, LifecycleError> {
        Err(LifecycleError::BackendUnavailable(
            TransportBackend::Broker.as_str().to_string(),
        ))
    }

    pub fn backend(&self) -> TransportBackend {
        self.backend
    }

    /// Producer intake uses to announce new submissions.
    pub fn producer(&self) -> Arc<dyn Producer> {
        Arc::clone(&self.producer)
    }

    /// Start the consumer. Connection failures are returned to the caller.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        self.consumer.start().await?;
        CONSUMER_RUNNING.set(1);
        info!("{} consumer running", self.consumer.name());
        Ok(())
    }

    /// Stop the consumer, then release the producer.
    pub async fn shutdown(&self) {
        info!("Shutting down {} transport", self.backend.as_str());
        self.consumer.shutdown().await;
        self.producer.close().await;
        CONSUMER_RUNNING.set(0);
    }

    pub fn is_running(&self) -> bool {
        self.consumer.is_running()
    }

    pub fn status(&self) -> LifecycleStatus {
        LifecycleStatus {
            backend: self.backend,
            consumer_running: self.consumer.is_running(),
            producer_available: self.producer.is_available(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::submission::{SqliteSubmissionStore, SubmissionStatus};
    use crate::testing::InMemoryBroker;
    use crate::validator::ContentRules;
    use std::time::Duration;

    fn test_config(backend: TransportBackend) -> Config {
        let mut config = Config::default();
        config.processor.backend = backend;
        config.processor.poll_interval_ms = 10;
        config.processor.shutdown_grace_ms = 1000;
        config.broker.poll_timeout_ms = 20;
        config.broker.retry_backoff_ms = 10;
        config
    }

    async fn wait_for_status(
        store: &dyn SubmissionStore,
        id: &str,
        status: SubmissionStatus,
    ) -> bool {
        for _ in 0..500 {
            if store.get(id).unwrap().map(|s| s.status) == Some(status) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_poll_backend_from_config() {
        let store: Arc<dyn SubmissionStore> = Arc::new(SqliteSubmissionStore::in_memory().unwrap());
        let lifecycle = ConsumerLifecycle::from_config(
            &test_config(TransportBackend::Poll),
            Arc::clone(&store),
            Arc::new(ContentRules::default()),
            Arc::new(SystemClock),
        )
        .unwrap();

        assert_eq!(lifecycle.backend(), TransportBackend::Poll);
        assert!(lifecycle.producer().is_available());
        assert!(!lifecycle.is_running());

        lifecycle.start().await.unwrap();
        assert!(lifecycle.status().consumer_running);

        let submission = store.create("abcdefgh1i").unwrap();
        lifecycle
            .producer()
            .produce(&submission.id, &submission.content)
            .await
            .unwrap();
        assert!(wait_for_status(store.as_ref(), &submission.id, SubmissionStatus::Passed).await);

        lifecycle.shutdown().await;
        assert!(!lifecycle.is_running());
        lifecycle.shutdown().await;
    }

    #[tokio::test]
    async fn test_broker_backend_end_to_end() {
        let store: Arc<dyn SubmissionStore> = Arc::new(SqliteSubmissionStore::in_memory().unwrap());
        let config = test_config(TransportBackend::Broker);
        let processor = Arc::new(SubmissionProcessor::new(
            Arc::clone(&store),
            Arc::new(ContentRules::default()),
        ));
        let broker = InMemoryBroker::new();
        let lifecycle = ConsumerLifecycle::broker(
            &config,
            processor,
            Arc::new(broker.clone()),
            broker.connector(),
        );

        lifecycle.start().await.unwrap();
        let submission = store.create("no digits here").unwrap();
        lifecycle
            .producer()
            .produce(&submission.id, &submission.content)
            .await
            .unwrap();

        assert!(wait_for_status(store.as_ref(), &submission.id, SubmissionStatus::Failed).await);

        lifecycle.shutdown().await;
        let status = lifecycle.status();
        assert_eq!(status.backend, TransportBackend::Broker);
        assert!(!status.consumer_running);
        assert!(!status.producer_available);
        assert!(broker.is_source_closed());
    }

    #[tokio::test]
    async fn test_start_failure_is_returned() {
        let store: Arc<dyn SubmissionStore> = Arc::new(SqliteSubmissionStore::in_memory().unwrap());
        let config = test_config(TransportBackend::Broker);
        let processor = Arc::new(SubmissionProcessor::new(
            Arc::clone(&store),
            Arc::new(ContentRules::default()),
        ));
        let broker = InMemoryBroker::new();
        broker.fail_next_connect();
        let lifecycle = ConsumerLifecycle::broker(
            &config,
            processor,
            Arc::new(broker.clone()),
            broker.connector(),
        );

        let err = lifecycle.start().await.unwrap_err();
        assert!(matches!(err, LifecycleError::Transport(_)));
        assert!(!lifecycle.is_running());

        // A later attempt can still succeed
        lifecycle.start().await.unwrap();
        assert!(lifecycle.is_running());
        lifecycle.shutdown().await;
    }

    #[cfg(not(feature = "kafka"))]
    #[test]
    fn test_broker_backend_requires_kafka_feature() {
        let store: Arc<dyn SubmissionStore> = Arc::new(SqliteSubmissionStore::in_memory().unwrap());
        let result = ConsumerLifecycle::from_config(
            &test_config(TransportBackend::Broker),
            store,
            Arc::new(ContentRules::default()),
            Arc::new(SystemClock),
        );
        assert!(matches!(result, Err(LifecycleError::BackendUnavailable(_))));
    }
}
