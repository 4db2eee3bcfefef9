//! Library events producer - an HTTP to Kafka bridge.
//!
//! `POST /v1/libraryevent` takes a [`LibraryEvent`], keys it by its
//! `libraryEventId` and publishes it to a topic through a [`bus::Publisher`].
//! The [`LibraryEventsProducer`] offers three send paths: fire-and-forget,
//! a bounded wait for the acknowledgment, and the bounded wait with an
//! `event-source` header attached.

pub mod bus;
pub mod config;
pub mod domain;
#[cfg(feature = "http")]
pub mod http;
pub mod producer;

pub use config::{BrokerKind, Config, ConfigError, SendMode};
pub use domain::{Book, LibraryEvent};
pub use producer::{
    DeliveryListener, Dispatch, LibraryEventsProducer, SendOutcome, SendResult,
    EVENT_SOURCE, EVENT_SOURCE_HEADER,
};
