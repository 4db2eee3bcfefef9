//! Library events producer - turns a `LibraryEvent` into a keyed record and
//! hands it to the broker.
//!
//! Three send paths:
//!
//! - [`LibraryEventsProducer::send_library_event_async`] submits and returns a
//!   `JoinHandle` right away. The outcome is logged from a spawned task; the
//!   caller is not told about failures.
//! - [`LibraryEventsProducer::send_library_event_sync`] waits for the broker
//!   acknowledgment, up to the configured send timeout.
//! - [`LibraryEventsProducer::send_library_event_record`] waits the same way
//!   but attaches an `event-source: scanner` header to the record.
//!
//! ## Example
//!
//! ```ignore
//! let producer = LibraryEventsProducer::new(kafka_publisher, "library-events")
//!     .with_send_mode(SendMode::Sync);
//!
//! let result = producer.send_library_event_sync(&event).await?;
//! println!("landed on partition {}", result.metadata.partition);
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::bus::{PublishError, Publisher, Record, RecordMetadata};
use crate::config::{Config, SendMode, DEFAULT_SEND_TIMEOUT};
use crate::domain::LibraryEvent;

/// Header attached by the header-enriched send path.
pub const EVENT_SOURCE_HEADER: &str = "event-source";
pub const EVENT_SOURCE: &str = "scanner";

/// A record the broker acknowledged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendResult {
    pub key: Option<i32>,
    pub value: String,
    pub metadata: RecordMetadata,
}

/// The result of one send attempt, produced exactly once per attempt.
pub type SendOutcome = Result<SendResult, PublishError>;

/// Callback run after each completed send, after the outcome is logged.
///
/// A panicking listener is caught and logged; the send outcome and the
/// remaining listeners are unaffected.
pub type DeliveryListener = Arc<dyn Fn(&SendOutcome) + Send + Sync>;

/// What [`LibraryEventsProducer::dispatch`] did with the event.
#[derive(Debug)]
pub enum Dispatch {
    /// Submitted without waiting; the handle resolves once the broker answers
    Accepted(JoinHandle<SendOutcome>),
    /// The broker acknowledged before `dispatch` returned
    Delivered(SendResult),
}

/// Count of fire-and-forget delivery tasks still waiting on the broker.
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Held by a delivery task; releases its slot even if a listener panics.
struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn acquire(in_flight: &Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(in_flight))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Publishes library events to a single topic.
///
/// Holds no per-send state: concurrent sends share only the publisher,
/// which is expected to be safe to call from many tasks.
pub struct LibraryEventsProducer<P> {
    publisher: P,
    topic: String,
    send_timeout: Duration,
    send_mode: SendMode,
    listeners: Vec<DeliveryListener>,
    in_flight: Arc<InFlight>,
}

impl<P: Publisher + 'static> LibraryEventsProducer<P> {
    /// Create a fire-and-forget producer with the default send timeout.
    pub fn new(publisher: P, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
            send_mode: SendMode::default(),
            listeners: Vec::new(),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Create a producer using the topic, mode and timeout from `config`.
    pub fn from_config(publisher: P, config: &Config) -> Self {
        Self::new(publisher, config.topic.clone())
            .with_send_mode(config.send_mode)
            .with_send_timeout(config.send_timeout)
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_send_mode(mut self, mode: SendMode) -> Self {
        self.send_mode = mode;
        self
    }

    /// Register a callback for every completed send.
    ///
    /// Fire-and-forget sends run the callback on the delivery task, so it
    /// must not rely on the request that triggered the send still being
    /// around.
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&SendOutcome) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    pub fn send_mode(&self) -> SendMode {
        self.send_mode
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Send using the configured mode.
    pub async fn dispatch(&self, event: &LibraryEvent) -> Result<Dispatch, PublishError> {
        match self.send_mode {
            SendMode::FireAndForget => self.send_library_event_async(event).map(Dispatch::Accepted),
            SendMode::Sync => self.send_library_event_sync(event).await.map(Dispatch::Delivered),
            SendMode::SyncWithHeaders => self
                .send_library_event_record(event)
                .await
                .map(Dispatch::Delivered),
        }
    }

    /// Submit the event and return without waiting for the broker.
    ///
    /// Only a serialization failure is returned here. Broker failures are
    /// logged from the delivery task and reach listeners, never the caller.
    /// Must be called from inside a Tokio runtime.
    pub fn send_library_event_async(
        &self,
        event: &LibraryEvent,
    ) -> Result<JoinHandle<SendOutcome>, PublishError> {
        let record = self.build_record(event, false)?;
        let (key, value) = (record.key, record.value.clone());
        let delivery = self.publisher.send(record);
        let listeners = self.listeners.clone();
        let guard = InFlightGuard::acquire(&self.in_flight);

        Ok(tokio::spawn(async move {
            let _guard = guard;
            let outcome = delivery.await.map(|metadata| SendResult {
                key,
                value,
                metadata,
            });
            complete(&listeners, &outcome);
            outcome
        }))
    }

    /// Send the event and wait for the acknowledgment, up to the send timeout.
    pub async fn send_library_event_sync(
        &self,
        event: &LibraryEvent,
    ) -> Result<SendResult, PublishError> {
        let record = self.build_record(event, false)?;
        self.send_and_wait(record).await
    }

    /// Same as [`send_library_event_sync`](Self::send_library_event_sync), with
    /// an `event-source: scanner` header on the record.
    pub async fn send_library_event_record(
        &self,
        event: &LibraryEvent,
    ) -> Result<SendResult, PublishError> {
        let record = self.build_record(event, true)?;
        self.send_and_wait(record).await
    }

    /// Flush records still buffered in the publisher.
    ///
    /// May block the thread; call it from `spawn_blocking` inside a runtime.
    pub fn flush(&self, timeout: Duration) -> Result<(), PublishError> {
        self.publisher.flush(timeout)
    }

    /// Number of fire-and-forget sends whose outcome has not been logged yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Wait until every fire-and-forget send has completed, up to `timeout`.
    ///
    /// Returns `false` if sends were still pending when the timeout hit.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let idle = async {
            loop {
                let notified = self.in_flight.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, idle).await.is_ok()
    }

    /// Serialize first, then read the key, so a bad event never reaches the
    /// broker.
    fn build_record(
        &self,
        event: &LibraryEvent,
        with_headers: bool,
    ) -> Result<Record, PublishError> {
        let value = event.to_wire().map_err(|e| {
            let err = PublishError::from(e);
            error!(error = %err, "failed to serialize library event");
            err
        })?;
        let record = Record::new(self.topic.clone(), event.key(), value);
        if with_headers {
            Ok(record.with_header(EVENT_SOURCE_HEADER, EVENT_SOURCE))
        } else {
            Ok(record)
        }
    }

    async fn send_and_wait(&self, record: Record) -> Result<SendResult, PublishError> {
        let (key, value) = (record.key, record.value.clone());
        let delivery = tokio::time::timeout(self.send_timeout, self.publisher.send(record));
        let outcome = match delivery.await {
            Ok(Ok(metadata)) => Ok(SendResult {
                key,
                value,
                metadata,
            }),
            Ok(Err(err)) => Err(err),
            Err(_elapsed) => Err(PublishError::Timeout(self.send_timeout)),
        };
        complete(&self.listeners, &outcome);
        outcome
    }
}

fn complete(listeners: &[DeliveryListener], outcome: &SendOutcome) {
    match outcome {
        Ok(result) => handle_success(result),
        Err(err) => handle_failure(err),
    }
    for listener in listeners {
        if panic::catch_unwind(AssertUnwindSafe(|| listener(outcome))).is_err() {
            error!("delivery listener panicked");
        }
    }
}

fn handle_success(result: &SendResult) {
    info!(
        key = ?result.key,
        value = %result.value,
        partition = result.metadata.partition,
        offset = result.metadata.offset,
        "Message sent successfully"
    );
}

fn handle_failure(err: &PublishError) {
    error!(error = %err, "Error sending the message from the producer to kafka");
}
