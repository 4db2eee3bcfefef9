//! HTTP endpoint - accepts library events and hands them to the producer.
//!
//! Requires the `http` feature. Uses axum for routing.
//!
//! ## Routes
//!
//! - `POST /v1/libraryevent` — body = `LibraryEvent` JSON. Returns `201` with
//!   the event echoed back. In fire-and-forget mode the `201` only means the
//!   event was accepted; delivery is confirmed later, in the logs.
//! - `GET /health` — `{ "ok": true, "topic": ..., "mode": ... }`.
//!
//! Synchronous modes turn send failures into `500` (serialization), `502`
//! (broker rejected) or `504` (no acknowledgment in time), with body
//! `{ "error": "..." }`.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::bus::Publisher;
use crate::domain::LibraryEvent;
use crate::producer::LibraryEventsProducer;

pub const LIBRARY_EVENT_PATH: &str = "/v1/libraryevent";

/// Build an axum `Router` serving the library event endpoint.
pub fn router<P: Publisher + 'static>(producer: Arc<LibraryEventsProducer<P>>) -> Router {
    Router::new()
        .route("/health", get(health_handler::<P>))
        .route(LIBRARY_EVENT_PATH, post(library_event_handler::<P>))
        .with_state(producer)
        .layer(TraceLayer::new_for_http())
}

/// Serve the endpoint at the given address (e.g. `"0.0.0.0:8080"`).
pub async fn serve<P: Publisher + 'static>(
    producer: Arc<LibraryEventsProducer<P>>,
    addr: &str,
) -> Result<(), std::io::Error> {
    serve_with_shutdown(producer, addr, std::future::pending()).await
}

/// Serve until `shutdown` resolves, then let in-flight requests finish.
pub async fn serve_with_shutdown<P, F>(
    producer: Arc<LibraryEventsProducer<P>>,
    addr: &str,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    P: Publisher + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(producer);
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// `GET /health`
async fn health_handler<P: Publisher + 'static>(
    State(producer): State<Arc<LibraryEventsProducer<P>>>,
) -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "topic": producer.topic(),
        "mode": producer.send_mode().as_str(),
    }))
}

/// `POST /v1/libraryevent`
async fn library_event_handler<P: Publisher + 'static>(
    State(producer): State<Arc<LibraryEventsProducer<P>>>,
    Json(event): Json<LibraryEvent>,
) -> Response {
    info!(?event, "libraryEvent received");
    // Fire-and-forget answers 201 before the broker has acknowledged anything.
    match producer.dispatch(&event).await {
        Ok(_) => (StatusCode::CREATED, Json(event)).into_response(),
        Err(e) => {
            warn!(error = %e, "library event not published");
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}
