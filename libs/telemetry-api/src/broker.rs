use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::{DeliveryMode, StageError};

// ════════════════════════════════════════════════════════════════
//  Broker Capability Traits
// ════════════════════════════════════════════════════════════════

/// Producer side of the broker. One handle is shared by all concurrent
/// ingest requests, so implementations rely on the client's own
/// internal synchronization.
pub trait TelemetryPublisher: Send + Sync {
    /// Publish one encoded record to `topic`. How long this waits for the
    /// broker depends on the adapter's delivery mode.
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        key: Option<&'a str>,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + 'a>>;

    /// Whether `publish` returns before or after the broker acknowledges.
    /// Callers decide from this whether a publish error reaches the client.
    fn delivery(&self) -> DeliveryMode;

    /// Drain pending deliveries (graceful shutdown).
    fn flush(&self, timeout: Duration) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>>;
}

/// Result of a single bounded poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polled {
    Message(ConsumedMessage),
    /// Nothing arrived within the poll bound. Not an error.
    Timeout,
}

/// Owned copy of one broker message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    /// Message value. Empty when the broker message had no value.
    pub payload: Vec<u8>,
}

/// Consumer side of the broker. Owned exclusively by the dispatch loop.
pub trait TelemetryConsumer: Send {
    fn subscribe(&mut self, topics: &[String]) -> Result<(), StageError>;

    /// Wait at most `timeout` for the next message.
    fn poll(&mut self, timeout: Duration) -> Pin<Box<dyn Future<Output = Result<Polled, StageError>> + Send + '_>>;

    /// Mark `message` (and everything before it on its partition) as processed
    /// for this consumer group.
    fn commit(&mut self, message: &ConsumedMessage) -> Result<(), StageError>;

    /// Release the subscription. Further polls are not expected.
    fn close(&mut self);
}
