use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed to call the API from a browser.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("submissions.db")
}

/// Which transport drives the processor.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransportBackend {
    /// Push: submissions are published to a broker topic and consumed from it.
    Broker,
    /// Pull: the store is scanned periodically for pending submissions.
    #[default]
    Poll,
}

impl TransportBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportBackend::Broker => "broker",
            TransportBackend::Poll => "poll",
        }
    }
}

/// Processing configuration shared by both transports.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorConfig {
    /// Transport backend selection.
    #[serde(default)]
    pub backend: TransportBackend,

    /// How often the poll backend scans for pending submissions (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How long a submission may stay PROCESSING before it is reclaimed (seconds).
    #[serde(default = "default_lease_timeout")]
    pub lease_timeout_secs: u64,

    /// How long shutdown waits for the consumer loop before aborting it (milliseconds).
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
}

fn default_poll_interval() -> u64 {
    1000 // 1 second
}

fn default_lease_timeout() -> u64 {
    300 // 5 minutes
}

fn default_shutdown_grace() -> u64 {
    5000
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            backend: TransportBackend::default(),
            poll_interval_ms: default_poll_interval(),
            lease_timeout_secs: default_lease_timeout(),
            shutdown_grace_ms: default_shutdown_grace(),
        }
    }
}

impl ProcessorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Message broker configuration (used when `processor.backend = "broker"`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    /// Broker endpoints, e.g. `["localhost:9092"]`.
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: Vec<String>,

    /// Topic new submissions are published to.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Consumer group identifier.
    #[serde(default = "default_group_id")]
    pub group_id: String,

    /// Extra publish attempts after the first one fails.
    #[serde(default = "default_publish_retries")]
    pub publish_retries: u32,

    /// Time to wait for broker acknowledgment per publish attempt (milliseconds).
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_ms: u64,

    /// Upper bound on a single consumer poll (milliseconds).
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,

    /// Pause after a transport error or a failed message before continuing (milliseconds).
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_bootstrap_servers() -> Vec<String> {
    vec!["localhost:9092".to_string()]
}

fn default_topic() -> String {
    "submissions".to_string()
}

fn default_group_id() -> String {
    "submission-processor".to_string()
}

fn default_publish_retries() -> u32 {
    3
}

fn default_publish_timeout() -> u64 {
    5000
}

fn default_poll_timeout() -> u64 {
    1000
}

fn default_retry_backoff() -> u64 {
    1000
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            topic: default_topic(),
            group_id: default_group_id(),
            publish_retries: default_publish_retries(),
            publish_timeout_ms: default_publish_timeout(),
            poll_timeout_ms: default_poll_timeout(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

impl BrokerConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Built-in content rule configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidatorConfig {
    /// Minimum content length in characters.
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Pattern the content must contain somewhere. Empty disables the check.
    #[serde(default = "default_required_pattern")]
    pub required_pattern: Option<String>,
}

fn default_min_length() -> usize {
    10
}

fn default_required_pattern() -> Option<String> {
    Some("[0-9]".to_string())
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            required_pattern: default_required_pattern(),
        }
    }
}

/// Logging configuration. `RUST_LOG` takes precedence when set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Config as served by the API: broker credentials redacted, inactive
/// sections omitted.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub processor: ProcessorConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker: Option<SanitizedBrokerConfig>,
    pub validator: ValidatorConfig,
}

/// Broker settings without endpoint credentials.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedBrokerConfig {
    pub bootstrap_servers: Vec<String>,
    pub topic: String,
    pub group_id: String,
    pub publish_retries: u32,
}

/// Hide `user:password@` in an endpoint.
fn redact_endpoint(endpoint: &str) -> String {
    match endpoint.rsplit_once('@') {
        Some((_, host)) => format!("***@{}", host),
        None => endpoint.to_string(),
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            processor: config.processor.clone(),
            broker: (config.processor.backend == TransportBackend::Broker).then(|| {
                SanitizedBrokerConfig {
                    bootstrap_servers: config
                        .broker
                        .bootstrap_servers
                        .iter()
                        .map(|s| redact_endpoint(s))
                        .collect(),
                    topic: config.broker.topic.clone(),
                    group_id: config.broker.group_id.clone(),
                    publish_retries: config.broker.publish_retries,
                }
            }),
            validator: config.validator.clone(),
        }
    }
}
