pub mod clock;
pub mod config;
pub mod intake;
pub mod lifecycle;
pub mod metrics;
pub mod processor;
pub mod submission;
pub mod testing;
pub mod transport;
pub mod validator;

pub use clock::{Clock, SystemClock};
pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, BrokerConfig,
    Config, ConfigError, DatabaseConfig, LoggingConfig, ProcessorConfig, SanitizedBrokerConfig,
    SanitizedConfig, ServerConfig, TransportBackend, ValidatorConfig,
};
pub use intake::{IntakeError, StatusCounts, SubmissionService};
pub use lifecycle::{ConsumerLifecycle, LifecycleError, LifecycleStatus};
pub use processor::{
    ProcessOutcome, ProcessorError, SubmissionProcessor, DEFAULT_LEASE_TIMEOUT_SECS,
};
pub use submission::{
    SqliteSubmissionStore, StatusUpdate, Submission, SubmissionError, SubmissionFilter,
    SubmissionStatus, SubmissionStore,
};
pub use transport::{
    BrokerConsumer, BrokerMessage, BrokerProducer, Consumer, MessageSink, MessageSource,
    PollConsumer, PollProducer, Producer, SourceConnector, SubmissionEvent, TransportError,
};
#[cfg(feature = "kafka")]
pub use transport::{KafkaSink, KafkaSource};
pub use validator::{ContentRules, ContentValidator, ValidationError};
