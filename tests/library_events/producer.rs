//! Dispatcher behavior against stub brokers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use library_events_producer::bus::{BrokerBehavior, InMemoryBroker, PublishError};
use library_events_producer::{LibraryEventsProducer, EVENT_SOURCE_HEADER};
use tokio::time::Instant;

use crate::support::{kafka_book, GatedBroker, SlowBroker, TOPIC};

/// The paused clock lands on the timer deadline, give or take one tick.
fn assert_elapsed(started: Instant, bound: Duration) {
    let elapsed = started.elapsed();
    assert!(elapsed >= bound, "gave up early after {:?}", elapsed);
    assert!(elapsed <= bound + Duration::from_millis(1), "gave up late after {:?}", elapsed);
}

#[tokio::test]
async fn key_is_library_event_id() {
    let broker = InMemoryBroker::with_partitions(3);
    let producer = LibraryEventsProducer::new(broker.clone(), TOPIC);

    for id in [0, 1, 42, -7, i32::MAX] {
        producer.send_library_event_sync(&kafka_book(Some(id))).await.unwrap();
    }

    let keys: Vec<Option<i32>> = broker.records().iter().map(|r| r.key).collect();
    assert_eq!(keys, vec![Some(0), Some(1), Some(42), Some(-7), Some(i32::MAX)]);
}

#[tokio::test]
async fn missing_id_sends_without_key() {
    let broker = InMemoryBroker::with_partitions(3);
    let producer = LibraryEventsProducer::new(broker.clone(), TOPIC);

    producer.send_library_event_sync(&kafka_book(None)).await.unwrap();
    producer.send_library_event_record(&kafka_book(None)).await.unwrap();

    assert!(broker.records().iter().all(|r| r.key.is_none()));
}

#[tokio::test]
async fn same_key_lands_on_same_partition() {
    let producer = LibraryEventsProducer::new(InMemoryBroker::with_partitions(5), TOPIC);

    let first = producer.send_library_event_sync(&kafka_book(Some(11))).await.unwrap();
    let second = producer.send_library_event_sync(&kafka_book(Some(11))).await.unwrap();

    assert_eq!(first.metadata.partition, second.metadata.partition);
    assert_eq!(second.metadata.offset, first.metadata.offset + 1);
}

#[tokio::test]
async fn value_is_exact_json_of_event() {
    let broker = InMemoryBroker::new();
    let producer = LibraryEventsProducer::new(broker.clone(), TOPIC);

    producer.send_library_event_sync(&kafka_book(Some(1))).await.unwrap();

    let record = &broker.records()[0];
    assert_eq!(record.topic, TOPIC);
    assert_eq!(
        record.value,
        r#"{"libraryEventId":1,"book":{"bookId":1,"bookName":"Kafka Using Spring Boot","bookAuthor":"Dilip"}}"#
    );
}

#[tokio::test]
async fn fire_and_forget_success_callback_fires_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let partitions = Arc::new(Mutex::new(Vec::new()));
    let (c, p) = (Arc::clone(&calls), Arc::clone(&partitions));
    let producer = LibraryEventsProducer::new(InMemoryBroker::with_partitions(4), TOPIC)
        .with_listener(move |outcome| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Ok(result) = outcome {
                p.lock().unwrap().push(result.metadata.partition);
            }
        });

    let handle = producer.send_library_event_async(&kafka_book(Some(6))).unwrap();
    let result = handle.await.unwrap().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*partitions.lock().unwrap(), vec![2]);
    assert_eq!(result.metadata.partition, 2);
}

#[tokio::test]
async fn fire_and_forget_failure_is_not_returned_to_caller() {
    let failures = Arc::new(AtomicUsize::new(0));
    let f = Arc::clone(&failures);
    let broker = InMemoryBroker::new().with_behavior(BrokerBehavior::Reject("broker down".into()));
    let producer = LibraryEventsProducer::new(broker, TOPIC).with_listener(move |outcome| {
        if outcome.is_err() {
            f.fetch_add(1, Ordering::SeqCst);
        }
    });

    // Submission itself succeeds; the failure only shows up on the delivery task.
    let handle = producer.send_library_event_async(&kafka_book(Some(1))).unwrap();
    let outcome = handle.await.unwrap();

    assert!(matches!(outcome, Err(PublishError::Broker(_))));
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn sync_send_times_out_at_the_bound() {
    let broker = InMemoryBroker::new().with_behavior(BrokerBehavior::Hang);
    let producer = LibraryEventsProducer::new(broker, TOPIC);

    let started = Instant::now();
    let err = producer.send_library_event_sync(&kafka_book(Some(1))).await.unwrap_err();

    assert!(matches!(err, PublishError::Timeout(bound) if bound == Duration::from_secs(3)));
    assert_elapsed(started, Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn record_send_times_out_at_the_bound() {
    let broker = InMemoryBroker::new().with_behavior(BrokerBehavior::Hang);
    let producer = LibraryEventsProducer::new(broker, TOPIC);

    let started = Instant::now();
    let err = producer.send_library_event_record(&kafka_book(None)).await.unwrap_err();

    assert!(err.is_timeout());
    assert_elapsed(started, Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn slow_ack_inside_the_bound_succeeds() {
    let broker = SlowBroker {
        inner: InMemoryBroker::new(),
        delay: Duration::from_millis(2_999),
    };
    let producer = LibraryEventsProducer::new(broker, TOPIC);

    let started = Instant::now();
    let result = producer.send_library_event_sync(&kafka_book(Some(3))).await.unwrap();

    assert_eq!(result.key, Some(3));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn custom_bound_is_honored() {
    let broker = InMemoryBroker::new().with_behavior(BrokerBehavior::Hang);
    let producer =
        LibraryEventsProducer::new(broker, TOPIC).with_send_timeout(Duration::from_millis(500));

    let started = Instant::now();
    let err = producer.send_library_event_sync(&kafka_book(Some(1))).await.unwrap_err();

    assert!(err.is_timeout());
    assert_elapsed(started, Duration::from_millis(500));
}

#[tokio::test]
async fn record_send_always_has_single_event_source_header() {
    let broker = InMemoryBroker::new();
    let producer = LibraryEventsProducer::new(broker.clone(), TOPIC);

    let mut odd = kafka_book(Some(99));
    odd.book.book_name = "event-source".into();
    odd.book.book_author = String::new();

    for event in [kafka_book(Some(1)), kafka_book(None), odd] {
        producer.send_library_event_record(&event).await.unwrap();
    }

    for record in broker.records() {
        assert_eq!(record.headers.len(), 1);
        let header = record.header(EVENT_SOURCE_HEADER).unwrap();
        assert_eq!(header.value_str(), Some("scanner"));
    }
}

#[tokio::test]
async fn concurrent_sends_have_independent_outcomes() {
    let broker = InMemoryBroker::with_partitions(4);
    let producer = LibraryEventsProducer::new(broker.clone(), TOPIC);

    let handles: Vec<_> = (0..20)
        .map(|id| producer.send_library_event_async(&kafka_book(Some(id))).unwrap())
        .collect();

    for (id, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.key, Some(id as i32));
        assert_eq!(result.metadata.partition, id as i32 % 4);
    }
    assert_eq!(broker.len(), 20);
}

#[tokio::test]
async fn drain_waits_for_pending_fire_and_forget_sends() {
    let logged = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&logged);
    let broker = GatedBroker::new(InMemoryBroker::new());
    let producer = LibraryEventsProducer::new(broker.clone(), TOPIC).with_listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    for id in 0..3 {
        producer.send_library_event_async(&kafka_book(Some(id))).unwrap();
    }
    assert_eq!(producer.in_flight(), 3);
    assert!(!producer.drain(Duration::from_millis(50)).await);

    broker.open();
    assert!(producer.drain(Duration::from_secs(5)).await);
    assert_eq!(producer.in_flight(), 0);
    assert_eq!(logged.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn drain_returns_at_once_when_idle() {
    let producer = LibraryEventsProducer::new(InMemoryBroker::new(), TOPIC);
    assert!(producer.drain(Duration::from_millis(1)).await);
}
