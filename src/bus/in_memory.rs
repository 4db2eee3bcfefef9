//! In-memory broker for testing and local runs.
//!
//! Records every submitted record in an append-only log and acknowledges,
//! rejects or ignores it according to its configured behavior.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use futures::future::{self, FutureExt};

use super::{DeliveryFuture, PublishError, Publisher, Record, RecordMetadata};

/// How the in-memory broker answers submitted records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrokerBehavior {
    /// Acknowledge every record
    Ack,
    /// Reject every record with the given reason
    Reject(String),
    /// Accept records but never answer
    Hang,
}

/// In-memory broker.
///
/// Features:
/// - Thread-safe (can be shared across threads via `Clone`)
/// - Keyed records go to `key mod partitions`
/// - Keyless records are spread round-robin
/// - Each partition keeps its own offset sequence
///
/// ## Example
///
/// ```
/// use library_events_producer::bus::{InMemoryBroker, Publisher, Record};
///
/// let broker = InMemoryBroker::with_partitions(3);
/// let ack = futures::executor::block_on(broker.send(Record::new("t", Some(4), "{}"))).unwrap();
/// assert_eq!(ack.partition, 1);
/// assert_eq!(broker.len(), 1);
/// ```
#[derive(Clone)]
pub struct InMemoryBroker {
    /// Every record submitted, in order
    log: Arc<RwLock<Vec<Record>>>,
    /// Next offset per partition
    offsets: Arc<Mutex<Vec<i64>>>,
    /// Round-robin cursor for keyless records
    cursor: Arc<AtomicUsize>,
    behavior: Arc<RwLock<BrokerBehavior>>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Create a single-partition broker that acknowledges everything.
    pub fn new() -> Self {
        Self::with_partitions(1)
    }

    /// Create a broker with the given number of partitions (at least one).
    pub fn with_partitions(partitions: usize) -> Self {
        Self {
            log: Arc::new(RwLock::new(Vec::new())),
            offsets: Arc::new(Mutex::new(vec![0; partitions.max(1)])),
            cursor: Arc::new(AtomicUsize::new(0)),
            behavior: Arc::new(RwLock::new(BrokerBehavior::Ack)),
        }
    }

    /// Builder-style behavior override.
    pub fn with_behavior(self, behavior: BrokerBehavior) -> Self {
        self.set_behavior(behavior);
        self
    }

    /// Change how subsequent records are answered.
    pub fn set_behavior(&self, behavior: BrokerBehavior) {
        *self.behavior.write().unwrap_or_else(|e| e.into_inner()) = behavior;
    }

    pub fn partitions(&self) -> usize {
        self.lock_offsets().len()
    }

    /// Get all records submitted so far.
    pub fn records(&self) -> Vec<Record> {
        self.log.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Get the total number of records submitted.
    pub fn len(&self) -> usize {
        self.log.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if nothing has been submitted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Partition a record would be assigned to, given the key.
    fn assign_partition(&self, key: Option<i32>, partitions: usize) -> usize {
        match key {
            Some(key) => key.rem_euclid(partitions as i32) as usize,
            None => self.cursor.fetch_add(1, Ordering::Relaxed) % partitions,
        }
    }

    fn lock_offsets(&self) -> MutexGuard<'_, Vec<i64>> {
        self.offsets.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Publisher for InMemoryBroker {
    fn send(&self, record: Record) -> DeliveryFuture {
        let behavior = self
            .behavior
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        self.log
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());

        match behavior {
            BrokerBehavior::Ack => {
                let mut offsets = self.lock_offsets();
                let partition = self.assign_partition(record.key, offsets.len());
                let offset = offsets[partition];
                offsets[partition] += 1;
                let metadata = RecordMetadata {
                    topic: record.topic,
                    partition: partition as i32,
                    offset,
                };
                future::ready(Ok::<_, PublishError>(metadata)).boxed()
            }
            BrokerBehavior::Reject(reason) => {
                future::ready(Err::<RecordMetadata, _>(PublishError::broker(reason))).boxed()
            }
            BrokerBehavior::Hang => future::pending::<Result<RecordMetadata, PublishError>>().boxed(),
        }
    }
}
