mod http;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;

use telemetry_api::TelemetryPublisher;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("bind {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },

    #[error("serve: {0}")]
    Serve(#[source] std::io::Error),
}

/// Shared by every request; the publisher is the only shared resource.
/// Whether publish failures reach the client follows the publisher's
/// own delivery mode.
#[derive(Clone)]
pub struct IngestState {
    pub publisher: Arc<dyn TelemetryPublisher>,
    pub topic: String,
    /// Use `trip_id` as the broker message key.
    pub key_by_trip: bool,
}

pub fn router(state: IngestState) -> Router {
    Router::new()
        .route("/telemetry", post(http::handle_telemetry))
        .route("/health", get(http::handle_health))
        .with_state(state)
}

/// Telemetry ingest HTTP server. Returns once `shutdown` is cancelled and
/// in-flight requests have finished.
pub async fn run(
    addr: &str,
    state: IngestState,
    shutdown: CancellationToken,
) -> Result<(), IngestError> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| IngestError::Bind { addr: addr.to_string(), source: e })?;
    if let Ok(local) = listener.local_addr() {
        tracing::info!(addr = %local, "ingest api listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(IngestError::Serve)?;

    Ok(())
}
