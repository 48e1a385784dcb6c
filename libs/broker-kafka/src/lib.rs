//! Kafka adapters for the telemetry broker capabilities.

mod consumer;
mod producer;

pub use consumer::{KafkaConsumer, KafkaConsumerConfig};
pub use producer::{KafkaProducerConfig, KafkaPublisher};
