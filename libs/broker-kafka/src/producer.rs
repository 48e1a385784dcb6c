use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use telemetry_api::{DeliveryMode, StageError, TelemetryPublisher};

// ═══════════════════════════════════════════════════════════════
//  Config
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct KafkaProducerConfig {
    pub bootstrap_servers: String,
    /// Broker acknowledgment level (`0`, `1`, `all`).
    pub acks: String,
    pub delivery: DeliveryMode,
    /// How long `SyncAck` waits for the broker.
    pub ack_timeout: Duration,
    /// librdkafka's own bound for delivering a queued message.
    pub message_timeout_ms: u64,
}

impl KafkaProducerConfig {
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            acks: "all".into(),
            delivery: DeliveryMode::FireAndForget,
            ack_timeout: Duration::from_secs(5),
            message_timeout_ms: 30_000,
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("acks", &self.acks)
            .set("message.timeout.ms", self.message_timeout_ms.to_string());
        config
    }
}

// ═══════════════════════════════════════════════════════════════
//  KafkaPublisher
// ═══════════════════════════════════════════════════════════════

/// Producer capability on a librdkafka `FutureProducer`.
///
/// The producer handle is internally synchronized and cheap to clone,
/// so one publisher serves all concurrent ingest requests.
pub struct KafkaPublisher {
    producer: FutureProducer,
    delivery: DeliveryMode,
    ack_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(config: &KafkaProducerConfig) -> Result<Self, StageError> {
        let producer: FutureProducer = config
            .client_config()
            .create()
            .map_err(|e| StageError::config(format!("kafka producer: {e}")))?;
        tracing::info!(
            bootstrap = %config.bootstrap_servers,
            acks = %config.acks,
            delivery = %config.delivery,
            "kafka producer created"
        );
        Ok(Self {
            producer,
            delivery: config.delivery,
            ack_timeout: config.ack_timeout,
        })
    }
}

impl TelemetryPublisher for KafkaPublisher {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        key: Option<&'a str>,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + 'a>> {
        Box::pin(async move {
            let mut record = FutureRecord::<str, [u8]>::to(topic).payload(payload.as_slice());
            if let Some(key) = key {
                record = record.key(key);
            }

            match self.delivery {
                DeliveryMode::FireAndForget => {
                    // Dropping the delivery future discards the report; the
                    // message stays queued in librdkafka.
                    self.producer
                        .send_result(record)
                        .map(drop)
                        .map_err(|(e, _)| StageError::io(format!("enqueue to '{topic}': {e}")))
                }
                DeliveryMode::SyncAck => {
                    let send = self.producer.send(record, Timeout::After(self.ack_timeout));
                    match tokio::time::timeout(self.ack_timeout, send).await {
                        Ok(Ok(_)) => Ok(()),
                        Ok(Err((e, _))) => Err(StageError::io(format!("deliver to '{topic}': {e}"))),
                        Err(_) => Err(StageError::io(format!(
                            "deliver to '{topic}': no ack within {} ms",
                            self.ack_timeout.as_millis()
                        ))),
                    }
                }
            }
        })
    }

    fn delivery(&self) -> DeliveryMode {
        self.delivery
    }

    fn flush(&self, timeout: Duration) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>> {
        let producer = self.producer.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
                .await
                .map_err(|e| StageError::state(format!("flush task: {e}")))?
                .map_err(|e| StageError::io(format!("flush: {e}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_carries_acks_and_timeouts() {
        let mut config = KafkaProducerConfig::new("kafka-1:9092,kafka-2:9092");
        config.acks = "1".into();
        config.message_timeout_ms = 1_500;
        let client = config.client_config();
        assert_eq!(client.get("bootstrap.servers"), Some("kafka-1:9092,kafka-2:9092"));
        assert_eq!(client.get("acks"), Some("1"));
        assert_eq!(client.get("message.timeout.ms"), Some("1500"));
    }

    #[test]
    fn defaults() {
        let config = KafkaProducerConfig::new("localhost:9092");
        assert_eq!(config.acks, "all");
        assert_eq!(config.delivery, DeliveryMode::FireAndForget);
        assert_eq!(config.ack_timeout, Duration::from_secs(5));
    }

    #[test]
    fn publisher_reports_configured_delivery() {
        // Creating the client does not contact the broker.
        let mut config = KafkaProducerConfig::new("localhost:9092");
        config.delivery = DeliveryMode::SyncAck;
        let publisher = KafkaPublisher::new(&config).unwrap();
        assert_eq!(publisher.delivery(), DeliveryMode::SyncAck);
    }
}
