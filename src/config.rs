//! Runtime configuration, read from CLI flags with environment fallbacks.

use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;

pub const DEFAULT_TOPIC: &str = "library-events";

/// Upper bound on the synchronous send paths.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(3);

/// Which send path the HTTP endpoint uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SendMode {
    /// Submit and return; the outcome is only logged
    #[default]
    FireAndForget,
    /// Wait for the acknowledgment up to the send timeout
    Sync,
    /// Like `Sync`, with the `event-source` header attached
    SyncWithHeaders,
}

impl SendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendMode::FireAndForget => "async",
            SendMode::Sync => "sync",
            SendMode::SyncWithHeaders => "record",
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SendMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "async" | "fire-and-forget" => Ok(SendMode::FireAndForget),
            "sync" => Ok(SendMode::Sync),
            "record" | "sync-with-headers" => Ok(SendMode::SyncWithHeaders),
            other => Err(ConfigError::UnknownSendMode(other.to_string())),
        }
    }
}

/// Which publisher the binary wires in.
///
/// Defaults to Kafka when built with the `kafka` feature, otherwise to the
/// in-memory broker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BrokerKind {
    #[cfg_attr(feature = "kafka", default)]
    Kafka,
    #[cfg_attr(not(feature = "kafka"), default)]
    Memory,
}

impl fmt::Display for BrokerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerKind::Kafka => f.write_str("kafka"),
            BrokerKind::Memory => f.write_str("memory"),
        }
    }
}

impl FromStr for BrokerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kafka" => Ok(BrokerKind::Kafka),
            "memory" | "in-memory" => Ok(BrokerKind::Memory),
            other => Err(ConfigError::UnknownBroker(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownSendMode(String),
    UnknownBroker(String),
    InvalidTimeout(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownSendMode(mode) => {
                write!(f, "unknown send mode {:?} (expected async, sync or record)", mode)
            }
            ConfigError::UnknownBroker(kind) => {
                write!(f, "unknown broker {:?} (expected kafka or memory)", kind)
            }
            ConfigError::InvalidTimeout(value) => {
                write!(f, "invalid send timeout {:?}: expected milliseconds", value)
            }
        }
    }
}

impl Error for ConfigError {}

fn parse_millis(value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidTimeout(value.to_string()))
}

/// Library events producer settings.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "library-events-producer")]
#[command(about = "Accepts library events over HTTP and publishes them to Kafka")]
pub struct Config {
    /// Topic library events are published to
    #[arg(long, env = "LIBRARY_EVENTS_TOPIC", default_value = DEFAULT_TOPIC)]
    pub topic: String,

    /// Kafka bootstrap servers
    #[arg(long, env = "KAFKA_BOOTSTRAP_SERVERS", default_value = "localhost:9092")]
    pub bootstrap_servers: String,

    /// Address the HTTP endpoint listens on
    #[arg(long, env = "HTTP_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Send path: async, sync or record
    #[arg(long, env = "SEND_MODE", default_value_t = SendMode::FireAndForget)]
    pub send_mode: SendMode,

    /// Acknowledgment bound for the synchronous send paths, in milliseconds
    #[arg(
        long = "send-timeout-ms",
        env = "SEND_TIMEOUT_MS",
        default_value = "3000",
        value_parser = parse_millis
    )]
    pub send_timeout: Duration,

    /// Publisher backend: kafka or memory
    #[arg(long, env = "BROKER", default_value_t = BrokerKind::default())]
    pub broker: BrokerKind,

    /// Partition count of the in-memory broker
    #[arg(long, env = "MEMORY_PARTITIONS", default_value_t = 3)]
    pub partitions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            bootstrap_servers: "localhost:9092".to_string(),
            listen_addr: "0.0.0.0:8080".to_string(),
            send_mode: SendMode::default(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
            broker: BrokerKind::default(),
            partitions: 3,
        }
    }
}

impl Config {
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_send_mode(mut self, mode: SendMode) -> Self {
        self.send_mode = mode;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }
}
