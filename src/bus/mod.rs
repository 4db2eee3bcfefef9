//! Broker seam - the abstraction library events are published through.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  LibraryEventsProducer                       │
//! │  - serializes the event, builds a Record                    │
//! │  - fire-and-forget / bounded wait / with headers            │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Publisher Trait                          │
//! │  send(record) -> DeliveryFuture / flush(timeout)             │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                           │
//!                 ▼                           ▼
//!        ┌────────────────┐         ┌───────────────────┐
//!        │ InMemoryBroker │         │  KafkaPublisher   │
//!        │  (included)    │         │ (feature "kafka") │
//!        └────────────────┘         └───────────────────┘
//! ```

mod in_memory;
#[cfg(feature = "kafka")]
mod kafka;
mod publisher;

pub use in_memory::{BrokerBehavior, InMemoryBroker};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaPublisher, KafkaPublisherBuilder};
pub use publisher::{DeliveryFuture, Header, PublishError, Publisher, Record, RecordMetadata};
