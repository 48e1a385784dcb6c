//! Shared types for the telemetry pipeline: the record that flows from the
//! ingest endpoint through the broker into storage, and the capability
//! traits each stage is wired through.

mod broker;
mod error;
mod record;
mod sink;
mod types;

pub use broker::{ConsumedMessage, Polled, TelemetryConsumer, TelemetryPublisher};
pub use error::{ErrorKind, StageError};
pub use record::TelemetryRecord;
pub use sink::TelemetrySink;
pub use types::{CommitPolicy, DeliveryMode};

/// Consumer group shared by every instance of the storage consumer.
pub const CONSUMER_GROUP: &str = "vehicle-group";
