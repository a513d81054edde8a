//! Kafka implementations of the broker seams (rdkafka).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer as _, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer as _};
use rdkafka::util::Timeout;
use rdkafka::{Message, Offset, TopicPartitionList};
use tracing::{info, warn};

use crate::config::BrokerConfig;

use super::traits::{MessageSink, MessageSource, SourceConnector};
use super::types::{BrokerMessage, TransportError};

const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka producer waiting for all in-sync replicas on every publish.
pub struct KafkaSink {
    producer: FutureProducer,
    closed: AtomicBool,
}

impl KafkaSink {
    pub fn connect(config: &BrokerConfig) -> Result<Self, TransportError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers.join(","))
            .set("acks", "all")
            .set("max.in.flight.requests.per.connection", "1")
            .set("message.timeout.ms", config.publish_timeout_ms.to_string())
            .create()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        info!(
            "Kafka producer created for {}",
            config.bootstrap_servers.join(",")
        );

        Ok(Self {
            producer,
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl MessageSink for KafkaSink {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("producer closed".to_string()));
        }

        let record = FutureRecord::<str, [u8]>::to(topic).key(key).payload(payload);
        self.producer
            .send(record, Timeout::After(timeout))
            .await
            .map(|_| ())
            .map_err(|(e, _)| TransportError::Publish(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.producer.flush(Timeout::After(FLUSH_TIMEOUT)) {
            warn!("Kafka producer flush failed: {}", e);
        }
    }
}

/// Kafka consumer-group member with auto-commit disabled.
pub struct KafkaSource {
    consumer: StreamConsumer,
}

impl KafkaSource {
    /// Create the consumer and subscribe it to the configured topic.
    pub fn connect(config: &BrokerConfig) -> Result<Self, TransportError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers.join(","))
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        info!(
            "Kafka consumer subscribed to {} as {}",
            config.topic, config.group_id
        );

        Ok(Self { consumer })
    }

    /// Connector that opens a fresh subscription on every consumer start.
    pub fn connector(config: &BrokerConfig) -> SourceConnector {
        let config = config.clone();
        Arc::new(move || {
            let source = KafkaSource::connect(&config)?;
            Ok(Arc::new(source) as Arc<dyn MessageSource>)
        })
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn poll(&self, timeout: Duration) -> Result<Option<BrokerMessage>, TransportError> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => Ok(None),
            Ok(Err(e)) => Err(TransportError::Consume(e.to_string())),
            Ok(Ok(message)) => Ok(Some(BrokerMessage {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message
                    .key()
                    .map(|k| String::from_utf8_lossy(k).into_owned()),
                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            })),
        }
    }

    async fn commit(&self, message: &BrokerMessage) -> Result<(), TransportError> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset + 1),
            )
            .map_err(|e| TransportError::Commit(e.to_string()))?;

        self.consumer
            .commit(&offsets, CommitMode::Sync)
            .map_err(|e| TransportError::Commit(e.to_string()))
    }

    async fn rewind(&self, message: &BrokerMessage) -> Result<(), TransportError> {
        self.consumer
            .seek(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset),
                Timeout::After(SEEK_TIMEOUT),
            )
            .map_err(|e| TransportError::Consume(e.to_string()))
    }

    async fn close(&self) {
        self.consumer.unsubscribe();
        info!("Kafka consumer unsubscribed");
    }
}
