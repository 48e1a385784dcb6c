use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use broker_kafka::KafkaConsumer;
use dispatch::{DispatchLoop, DispatchStats};
use storage_memory::MemorySink;
use storage_postgres::PostgresSink;
use telemetry_api::{TelemetryConsumer, TelemetrySink};

use super::shutdown::ShutdownSignal;
use crate::config::{Effective, Storage};
use crate::error::ConsumerError;

pub async fn run(eff: Effective) -> Result<DispatchStats, ConsumerError> {
    tracing::info!("telemetry-consumer starting");

    // --- Storage first: schema must exist before the first message ---
    let mut postgres = None;
    let sink: Arc<dyn TelemetrySink> = match &eff.storage {
        Storage::Postgres(db) => {
            let pg = Arc::new(PostgresSink::connect(db).await.map_err(ConsumerError::startup("postgres"))?);
            postgres = Some(pg.clone());
            pg
        }
        Storage::Memory(mem) => {
            tracing::warn!(max_records = mem.max_records, "dry run: readings are kept in memory only");
            Arc::new(MemorySink::from_config(mem).map_err(ConsumerError::startup("memory"))?)
        }
    };
    sink.init().await.map_err(ConsumerError::startup("migrate"))?;

    // --- Broker ---
    let mut consumer = KafkaConsumer::new(&eff.kafka).map_err(ConsumerError::startup("kafka"))?;
    consumer
        .subscribe(std::slice::from_ref(&eff.topic))
        .map_err(ConsumerError::startup("subscribe"))?;

    // --- CancellationToken for graceful shutdown ---
    let signal = ShutdownSignal::register()?;
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        match signal.recv().await {
            Ok(name) => tracing::info!(signal = name, "shutting down..."),
            Err(e) => tracing::error!(error = %e, "signal watch failed; shutting down"),
        }
        signal_token.cancel();
    });

    tracing::info!(topic = %eff.topic, "consumer ready");
    let stats = DispatchLoop::new(Box::new(consumer), sink, eff.dispatch).run(token).await;

    if let Some(pg) = postgres {
        pg.close().await;
    }
    tracing::info!("shutdown complete");
    Ok(stats)
}
