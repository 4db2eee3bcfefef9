use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use library_events_producer::bus::{InMemoryBroker, Publisher};
use library_events_producer::{http, BrokerKind, Config, LibraryEventsProducer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}=debug,tower_http=debug,axum::rejection=trace",
                    env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    info!(
        topic = %config.topic,
        mode = %config.send_mode,
        broker = %config.broker,
        "starting library events producer"
    );

    let publisher = build_publisher(&config)?;
    let producer = Arc::new(LibraryEventsProducer::from_config(publisher, &config));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for shutdown signal");
        }
    };
    http::serve_with_shutdown(Arc::clone(&producer), &config.listen_addr, shutdown).await?;

    info!("shutting down, flushing pending records");
    let flusher = Arc::clone(&producer);
    let timeout = config.send_timeout;
    tokio::task::spawn_blocking(move || flusher.flush(timeout)).await??;
    if !producer.drain(timeout).await {
        warn!(pending = producer.in_flight(), "exiting with undelivered library events");
    }
    Ok(())
}

fn build_publisher(config: &Config) -> Result<Arc<dyn Publisher>, Box<dyn Error + Send + Sync>> {
    match config.broker {
        BrokerKind::Memory => Ok(Arc::new(InMemoryBroker::with_partitions(config.partitions))),
        BrokerKind::Kafka => kafka_publisher(config),
    }
}

#[cfg(feature = "kafka")]
fn kafka_publisher(config: &Config) -> Result<Arc<dyn Publisher>, Box<dyn Error + Send + Sync>> {
    let publisher = library_events_producer::bus::KafkaPublisher::builder()
        .bootstrap_servers(&config.bootstrap_servers)
        .build()?;
    Ok(Arc::new(publisher))
}

#[cfg(not(feature = "kafka"))]
fn kafka_publisher(_config: &Config) -> Result<Arc<dyn Publisher>, Box<dyn Error + Send + Sync>> {
    Err("built without the `kafka` feature; rebuild with --features kafka or pass --broker memory".into())
}
