use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};

use telemetry_api::{
    CommitPolicy, ConsumedMessage, Polled, StageError, TelemetryConsumer, CONSUMER_GROUP,
};

// ═══════════════════════════════════════════════════════════════
//  Config
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct KafkaConsumerConfig {
    pub bootstrap_servers: String,
    pub group_id: String,
    pub commit: CommitPolicy,
    pub session_timeout_ms: u64,
}

impl KafkaConsumerConfig {
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            group_id: CONSUMER_GROUP.into(),
            commit: CommitPolicy::AfterStore,
            session_timeout_ms: 30_000,
        }
    }

    /// First run of a group starts from the earliest retained offset.
    /// Client auto-commit is on only for `CommitPolicy::Auto`.
    pub fn client_config(&self) -> ClientConfig {
        let auto_commit = match self.commit {
            CommitPolicy::AfterStore => "false",
            CommitPolicy::Auto => "true",
        };
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", &self.group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", auto_commit)
            .set("session.timeout.ms", self.session_timeout_ms.to_string());
        config
    }
}

// ═══════════════════════════════════════════════════════════════
//  KafkaConsumer
// ═══════════════════════════════════════════════════════════════

/// Consumer capability on a librdkafka `StreamConsumer`.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    group_id: String,
}

impl KafkaConsumer {
    pub fn new(config: &KafkaConsumerConfig) -> Result<Self, StageError> {
        let consumer: StreamConsumer = config
            .client_config()
            .create()
            .map_err(|e| StageError::config(format!("kafka consumer: {e}")))?;
        tracing::info!(
            bootstrap = %config.bootstrap_servers,
            group = %config.group_id,
            commit = %config.commit,
            "kafka consumer created"
        );
        Ok(Self {
            consumer,
            group_id: config.group_id.clone(),
        })
    }
}

impl TelemetryConsumer for KafkaConsumer {
    fn subscribe(&mut self, topics: &[String]) -> Result<(), StageError> {
        let names: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.consumer
            .subscribe(&names)
            .map_err(|e| StageError::io(format!("subscribe {names:?}: {e}")))?;
        tracing::info!(group = %self.group_id, topics = ?names, "subscribed");
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Pin<Box<dyn Future<Output = Result<Polled, StageError>> + Send + '_>> {
        Box::pin(async move {
            match tokio::time::timeout(timeout, self.consumer.recv()).await {
                Err(_) => Ok(Polled::Timeout),
                Ok(Err(e)) => Err(StageError::io(e.to_string())),
                Ok(Ok(message)) => Ok(Polled::Message(ConsumedMessage {
                    topic: message.topic().to_string(),
                    partition: message.partition(),
                    offset: message.offset(),
                    key: message.key().map(<[u8]>::to_vec),
                    payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                })),
            }
        })
    }

    fn commit(&mut self, message: &ConsumedMessage) -> Result<(), StageError> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(&message.topic, message.partition, Offset::Offset(message.offset + 1))
            .map_err(|e| StageError::state(format!("commit offset list: {e}")))?;
        self.consumer
            .commit(&offsets, CommitMode::Async)
            .map_err(|e| StageError::io(format!("commit: {e}")))
    }

    fn close(&mut self) {
        self.consumer.unsubscribe();
        tracing::info!(group = %self.group_id, "unsubscribed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn after_store_disables_auto_commit() {
        let config = KafkaConsumerConfig::new("localhost:9092").client_config();
        assert_eq!(config.get("group.id"), Some(CONSUMER_GROUP));
        assert_eq!(config.get("auto.offset.reset"), Some("earliest"));
        assert_eq!(config.get("enable.auto.commit"), Some("false"));
    }

    #[test]
    fn auto_policy_enables_auto_commit() {
        let mut config = KafkaConsumerConfig::new("localhost:9092");
        config.commit = CommitPolicy::Auto;
        let client = config.client_config();
        assert_eq!(client.get("enable.auto.commit"), Some("true"));
        assert_eq!(client.get("session.timeout.ms"), Some("30000"));
    }
}
