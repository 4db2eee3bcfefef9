//! Core publisher traits for the broker seam.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;

/// A single header attached to a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub key: String,
    pub value: Vec<u8>,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the value as a string (if valid UTF-8).
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

/// The envelope handed to the broker: topic, optional key, value and headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    /// Destination topic
    pub topic: String,
    /// Partition key; `None` lets the broker client pick the partition
    pub key: Option<i32>,
    /// Serialized payload
    pub value: String,
    /// Metadata that travels next to the payload
    pub headers: Vec<Header>,
}

impl Record {
    /// Create a record without headers.
    pub fn new(topic: impl Into<String>, key: Option<i32>, value: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key,
            value: value.into(),
            headers: Vec::new(),
        }
    }

    /// Add a header to the record.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push(Header::new(key, value));
        self
    }

    /// Find a header by key.
    pub fn header(&self, key: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.key == key)
    }
}

/// What the broker reports back once it has acknowledged a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordMetadata {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Error type for publish operations.
#[derive(Debug)]
pub enum PublishError {
    /// The event could not be converted to its wire form. Nothing was sent.
    Serialization(String),
    /// The broker did not acknowledge within the bound
    Timeout(Duration),
    /// The broker rejected the record or failed to deliver it
    Broker(Box<dyn Error + Send + Sync>),
}

impl PublishError {
    /// Build a broker error from a plain message.
    pub fn broker(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        PublishError::Broker(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PublishError::Timeout(_))
    }

    /// Map this error to an HTTP-style status code.
    pub fn status_code(&self) -> u16 {
        match self {
            PublishError::Serialization(_) => 500,
            PublishError::Broker(_) => 502,
            PublishError::Timeout(_) => 504,
        }
    }
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Serialization(msg) => write!(f, "serialization failed: {}", msg),
            PublishError::Timeout(bound) => {
                write!(f, "broker did not acknowledge within {:?}", bound)
            }
            PublishError::Broker(e) => write!(f, "broker error: {}", e),
        }
    }
}

impl Error for PublishError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PublishError::Broker(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialization(err.to_string())
    }
}

/// Pending acknowledgment for a submitted record.
///
/// The future is `'static` so it can be awaited on a task that outlives the
/// caller that submitted the record.
pub type DeliveryFuture = BoxFuture<'static, Result<RecordMetadata, PublishError>>;

/// Trait for handing records to a message broker.
///
/// Implementations are long-lived and shared across requests, so they must be
/// safe to call concurrently without outside locking.
///
/// Implementations include:
/// - `InMemoryBroker` - For testing and local runs
/// - `KafkaPublisher` - For Apache Kafka (requires the `kafka` feature)
pub trait Publisher: Send + Sync {
    /// Submit a record without waiting for the broker.
    ///
    /// Returns immediately; the returned future resolves once the broker has
    /// acknowledged or rejected the record.
    fn send(&self, record: Record) -> DeliveryFuture;

    /// Wait for in-flight records to be delivered.
    ///
    /// Default implementation has nothing buffered and returns immediately.
    fn flush(&self, _timeout: Duration) -> Result<(), PublishError> {
        Ok(())
    }
}

impl<P: Publisher + ?Sized> Publisher for std::sync::Arc<P> {
    fn send(&self, record: Record) -> DeliveryFuture {
        (**self).send(record)
    }

    fn flush(&self, timeout: Duration) -> Result<(), PublishError> {
        (**self).flush(timeout)
    }
}
