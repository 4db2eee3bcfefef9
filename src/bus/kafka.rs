//! Apache Kafka publisher backed by rdkafka's `FutureProducer`.
//!
//! Requires the `kafka` feature. Buffering, batching, partitioning and
//! retries are left to librdkafka.

use std::time::Duration;

use futures::future::{self, FutureExt};
use rdkafka::error::KafkaError;
use rdkafka::message::{Header as KafkaHeader, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use tracing::info;

use super::{DeliveryFuture, PublishError, Publisher, Record, RecordMetadata};

/// Builder for [`KafkaPublisher`].
pub struct KafkaPublisherBuilder {
    client_config: ClientConfig,
}

impl Default for KafkaPublisherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KafkaPublisherBuilder {
    pub fn new() -> Self {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", "localhost:9092")
            .set("message.timeout.ms", "5000")
            .set("acks", "all");
        Self { client_config }
    }

    /// Comma-separated `host:port` list.
    pub fn bootstrap_servers(mut self, servers: &str) -> Self {
        self.client_config.set("bootstrap.servers", servers);
        self
    }

    /// How long librdkafka keeps retrying a record before failing it.
    pub fn message_timeout(mut self, timeout: Duration) -> Self {
        self.client_config
            .set("message.timeout.ms", timeout.as_millis().to_string());
        self
    }

    /// Pass any other librdkafka property through.
    pub fn set(mut self, key: &str, value: &str) -> Self {
        self.client_config.set(key, value);
        self
    }

    pub fn build(self) -> Result<KafkaPublisher, KafkaError> {
        let producer: FutureProducer = self.client_config.create()?;
        info!(
            bootstrap_servers = self.client_config.get("bootstrap.servers").unwrap_or_default(),
            "created kafka producer"
        );
        Ok(KafkaPublisher { producer })
    }
}

/// Publishes records to Kafka.
///
/// Integer keys are written as four big-endian bytes, matching Kafka's
/// integer serializer, so keyed records share partitions with other clients
/// producing the same ids.
#[derive(Clone)]
pub struct KafkaPublisher {
    producer: FutureProducer,
}

impl KafkaPublisher {
    pub fn builder() -> KafkaPublisherBuilder {
        KafkaPublisherBuilder::new()
    }
}

/// Kafka's integer serializer writes four big-endian bytes.
fn key_bytes(key: Option<i32>) -> Option<[u8; 4]> {
    key.map(i32::to_be_bytes)
}

fn owned_headers(record: &Record) -> OwnedHeaders {
    record
        .headers
        .iter()
        .fold(OwnedHeaders::new_with_capacity(record.headers.len()), |acc, h| {
            acc.insert(KafkaHeader {
                key: &h.key,
                value: Some(&h.value[..]),
            })
        })
}

impl Publisher for KafkaPublisher {
    fn send(&self, record: Record) -> DeliveryFuture {
        let key = key_bytes(record.key);
        let mut future_record: FutureRecord<'_, [u8], str> = FutureRecord::to(&record.topic)
            .payload(record.value.as_str())
            .headers(owned_headers(&record));
        if let Some(key) = key.as_ref() {
            future_record = future_record.key(&key[..]);
        }

        let topic = record.topic.clone();
        match self.producer.send_result(future_record) {
            Ok(delivery) => async move {
                match delivery.await {
                    Ok(Ok((partition, offset))) => Ok(RecordMetadata {
                        topic,
                        partition,
                        offset,
                    }),
                    Ok(Err((err, _message))) => Err(PublishError::Broker(Box::new(err))),
                    Err(_canceled) => Err(PublishError::broker("producer dropped before delivery")),
                }
            }
            .boxed(),
            // Enqueue failed locally, e.g. the producer queue is full.
            Err((err, _record)) => {
                future::ready(Err::<RecordMetadata, _>(PublishError::Broker(Box::new(err)))).boxed()
            }
        }
    }

    fn flush(&self, timeout: Duration) -> Result<(), PublishError> {
        self.producer
            .flush(timeout)
            .map_err(|e| PublishError::Broker(Box::new(e)))
    }
}
