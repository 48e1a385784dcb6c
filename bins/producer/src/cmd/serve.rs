use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use broker_kafka::KafkaPublisher;
use ingest_api::IngestState;
use telemetry_api::TelemetryPublisher;

use super::shutdown::ShutdownSignal;
use crate::config::Effective;
use crate::error::ProducerError;

/// Upper bound on delivering queued messages once the server has stopped.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(eff: Effective) -> Result<(), ProducerError> {
    tracing::info!("telemetry-producer starting");

    let publisher = Arc::new(KafkaPublisher::new(&eff.kafka)?);
    let signal = ShutdownSignal::register()?;

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        match signal.recv().await {
            Ok(name) => tracing::info!(signal = name, "shutting down..."),
            Err(e) => tracing::error!(error = %e, "signal watch failed; shutting down"),
        }
        signal_token.cancel();
    });

    let state = IngestState {
        publisher: publisher.clone(),
        topic: eff.topic.clone(),
        key_by_trip: eff.key_by_trip,
    };
    tracing::info!(topic = %eff.topic, key_by_trip = eff.key_by_trip, "producer ready");

    let served = ingest_api::run(&eff.listen, state, token).await;

    // Deliver whatever is still queued, even if the server failed.
    if let Err(e) = publisher.flush(FLUSH_TIMEOUT).await {
        tracing::warn!(error = ?e, "flush incomplete; queued readings may be lost");
    }

    served?;
    tracing::info!("shutdown complete");
    Ok(())
}
