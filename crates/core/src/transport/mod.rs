//! Transport backends that trigger submission processing.
//!
//! Two interchangeable backends implement the [`Producer`] / [`Consumer`] pair:
//! - Broker: new submissions are published to a topic and consumed from it,
//!   committing offsets only after successful processing
//! - Poll: publishing is a no-op and a background task scans the store
//!
//! The broker backend talks to the outside world through the narrow
//! [`MessageSink`] / [`MessageSource`] seams. The Kafka implementation lives
//! behind the `kafka` feature; tests use the in-memory broker from
//! [`crate::testing`].

mod broker;
#[cfg(feature = "kafka")]
mod kafka;
mod poll;
mod task;
mod traits;
mod types;

pub use broker::{BrokerConsumer, BrokerProducer};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaSink, KafkaSource};
pub use poll::{PollConsumer, PollProducer};
pub use traits::{Consumer, MessageSink, MessageSource, Producer, SourceConnector};
pub use types::{BrokerMessage, SubmissionEvent, TransportError};
