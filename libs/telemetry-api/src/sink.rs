use std::future::Future;
use std::pin::Pin;

use crate::{StageError, TelemetryRecord};

/// Durable destination for decoded records.
///
/// No idempotency: storing the same record twice produces two rows.
pub trait TelemetrySink: Send + Sync {
    /// One-time startup work (schema creation). Must be idempotent.
    fn init(&self) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>>;

    /// Store one record.
    fn store<'a>(&'a self, record: &'a TelemetryRecord)
        -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + 'a>>;
}
