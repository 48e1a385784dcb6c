use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use telemetry_api::{
    CommitPolicy, ConsumedMessage, Polled, StageError, TelemetryConsumer, TelemetryRecord,
    TelemetrySink,
};

use crate::config::DispatchConfig;

// ═══════════════════════════════════════════════════════════════
//  State & stats
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// Terminal.
    Stopping,
}

/// Counters collected over one run of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub polls: u64,
    pub timeouts: u64,
    pub poll_errors: u64,
    pub decode_errors: u64,
    pub stored: u64,
    pub store_errors: u64,
    pub commit_errors: u64,
}

impl std::fmt::Display for DispatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "polls={} timeouts={} poll_errors={} decode_errors={} stored={} store_errors={} commit_errors={}",
            self.polls,
            self.timeouts,
            self.poll_errors,
            self.decode_errors,
            self.stored,
            self.store_errors,
            self.commit_errors,
        )
    }
}

// ═══════════════════════════════════════════════════════════════
//  DispatchLoop: poll → decode → store → commit
// ═══════════════════════════════════════════════════════════════

/// Sequential consumer loop: one poll, one decode, one store per iteration.
///
/// Every runtime failure (poll, decode, store, commit) is logged and the
/// message is skipped; nothing is retried and nothing escalates. The only
/// way out is the cancellation token, checked once per iteration before
/// the poll, so shutdown latency is bounded by one poll timeout plus the
/// in-flight store.
///
/// The consumer must already be subscribed.
pub struct DispatchLoop {
    consumer: Box<dyn TelemetryConsumer>,
    sink: Arc<dyn TelemetrySink>,
    config: DispatchConfig,
}

impl DispatchLoop {
    pub fn new(
        consumer: Box<dyn TelemetryConsumer>,
        sink: Arc<dyn TelemetrySink>,
        config: DispatchConfig,
    ) -> Self {
        Self { consumer, sink, config }
    }

    /// Run until `token` is cancelled, then release the subscription.
    pub async fn run(mut self, token: CancellationToken) -> DispatchStats {
        let mut stats = DispatchStats::default();
        let mut state = LoopState::Running;

        tracing::info!(
            poll_timeout_ms = self.config.poll_timeout.as_millis() as u64,
            commit = %self.config.commit,
            "dispatch loop running"
        );

        while state == LoopState::Running {
            state = self.step(&token, &mut stats).await;
        }

        self.consumer.close();
        tracing::info!(%stats, "dispatch loop stopped");
        stats
    }

    async fn step(&mut self, token: &CancellationToken, stats: &mut DispatchStats) -> LoopState {
        if token.is_cancelled() {
            tracing::info!("termination requested");
            return LoopState::Stopping;
        }

        stats.polls += 1;
        let message = match self.consumer.poll(self.config.poll_timeout).await {
            Ok(Polled::Message(message)) => message,
            Ok(Polled::Timeout) => {
                stats.timeouts += 1;
                return LoopState::Running;
            }
            Err(e) => {
                stats.poll_errors += 1;
                if poll_error_is_noise(&e) {
                    tracing::info!(error = %e, "poll error");
                } else {
                    // Will repeat every poll until the operator steps in.
                    tracing::warn!(error = %e, "poll error will not clear by retrying");
                }
                return LoopState::Running;
            }
        };

        let record = match TelemetryRecord::decode(&message.payload) {
            Ok(record) => record,
            Err(e) => {
                stats.decode_errors += 1;
                tracing::warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "failed to decode telemetry, skipping"
                );
                return LoopState::Running;
            }
        };

        if let Err(e) = self.sink.store(&record).await {
            stats.store_errors += 1;
            tracing::error!(
                trip_id = %record.trip_id,
                offset = message.offset,
                error = %e,
                "failed to save telemetry, skipping"
            );
            return LoopState::Running;
        }
        stats.stored += 1;
        tracing::debug!(trip_id = %record.trip_id, offset = message.offset, "telemetry saved");

        if self.config.commit == CommitPolicy::AfterStore {
            self.commit(&message, stats);
        }
        LoopState::Running
    }

    fn commit(&mut self, message: &ConsumedMessage, stats: &mut DispatchStats) {
        if let Err(e) = self.consumer.commit(message) {
            stats.commit_errors += 1;
            tracing::warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "offset commit failed"
            );
        }
    }
}

/// Broker I/O hiccups are routine for a long-lived consumer; config and
/// state errors are not, though the loop still keeps polling.
fn poll_error_is_noise(e: &StageError) -> bool {
    !e.kind().is_permanent()
}

/// Run the loop on its own task.
pub fn spawn_dispatch(dispatch: DispatchLoop, token: CancellationToken) -> JoinHandle<DispatchStats> {
    tokio::spawn(dispatch.run(token))
}
