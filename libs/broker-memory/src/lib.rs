//! In-process broker with the same observable contract the pipeline expects
//! from Kafka: retained per-topic logs, consumer groups with committed
//! offsets, earliest offset reset and bounded polls.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;

use telemetry_api::{ConsumedMessage, DeliveryMode, Polled, StageError, TelemetryConsumer, TelemetryPublisher};

/// Every memory topic has exactly one partition.
pub const PARTITION: i32 = 0;

// ═══════════════════════════════════════════════════════════════
//  Shared broker state
// ═══════════════════════════════════════════════════════════════

struct StoredMessage {
    key: Option<Vec<u8>>,
    payload: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    /// topic → append-only log; index = offset.
    logs: Mutex<HashMap<String, Vec<StoredMessage>>>,
    /// (group, topic) → next offset to consume.
    committed: Mutex<HashMap<(String, String), i64>>,
    /// Woken on every publish.
    published: Notify,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Inner {
    fn read(&self, topic: &str, offset: i64) -> Option<ConsumedMessage> {
        let logs = lock(&self.logs);
        let stored = logs.get(topic)?.get(usize::try_from(offset).ok()?)?;
        Some(ConsumedMessage {
            topic: topic.to_string(),
            partition: PARTITION,
            offset,
            key: stored.key.clone(),
            payload: stored.payload.clone(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryBroker
// ═══════════════════════════════════════════════════════════════

/// Handle to the broker. Clones share the same topics and offsets.
/// Topics are created on first publish or subscribe.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publisher(&self) -> MemoryPublisher {
        MemoryPublisher { inner: self.inner.clone() }
    }

    /// New consumer in `group`. It resumes from the group's committed
    /// offsets, or from the earliest retained message.
    pub fn consumer(&self, group: impl Into<String>) -> MemoryConsumer {
        MemoryConsumer {
            inner: self.inner.clone(),
            group: group.into(),
            positions: None,
            cursor: 0,
        }
    }

    /// Snapshot of the retained log of `topic`.
    pub fn messages(&self, topic: &str) -> Vec<ConsumedMessage> {
        let count = lock(&self.inner.logs).get(topic).map_or(0, Vec::len);
        (0..count as i64)
            .filter_map(|offset| self.inner.read(topic, offset))
            .collect()
    }

    /// Committed offset (next offset to consume) of `group` on `topic`.
    pub fn committed(&self, group: &str, topic: &str) -> Option<i64> {
        lock(&self.inner.committed)
            .get(&(group.to_string(), topic.to_string()))
            .copied()
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryPublisher
// ═══════════════════════════════════════════════════════════════

pub struct MemoryPublisher {
    inner: Arc<Inner>,
}

impl TelemetryPublisher for MemoryPublisher {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        key: Option<&'a str>,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + 'a>> {
        Box::pin(async move {
            let offset = {
                let mut logs = lock(&self.inner.logs);
                let log = logs.entry(topic.to_string()).or_default();
                log.push(StoredMessage {
                    key: key.map(|k| k.as_bytes().to_vec()),
                    payload,
                });
                log.len() - 1
            };
            self.inner.published.notify_waiters();
            tracing::trace!(%topic, offset, "published");
            Ok(())
        })
    }

    /// The log append is the acknowledgment.
    fn delivery(&self) -> DeliveryMode {
        DeliveryMode::SyncAck
    }

    fn flush(&self, _timeout: Duration) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryConsumer
// ═══════════════════════════════════════════════════════════════

pub struct MemoryConsumer {
    inner: Arc<Inner>,
    group: String,
    /// (topic, next offset). None until subscribed.
    positions: Option<Vec<(String, i64)>>,
    /// Round-robin start index over subscribed topics.
    cursor: usize,
}

impl MemoryConsumer {
    fn next_available(&mut self) -> Result<Option<ConsumedMessage>, StageError> {
        let positions = self
            .positions
            .as_mut()
            .ok_or_else(|| StageError::state("poll before subscribe"))?;
        let n = positions.len();
        for i in 0..n {
            let idx = (self.cursor + i) % n;
            let (topic, next) = &mut positions[idx];
            if let Some(message) = self.inner.read(topic, *next) {
                *next += 1;
                self.cursor = (idx + 1) % n;
                return Ok(Some(message));
            }
        }
        Ok(None)
    }
}

impl TelemetryConsumer for MemoryConsumer {
    fn subscribe(&mut self, topics: &[String]) -> Result<(), StageError> {
        if topics.is_empty() {
            return Err(StageError::config("no topics to subscribe"));
        }
        let committed = lock(&self.inner.committed);
        let mut logs = lock(&self.inner.logs);
        let positions = topics
            .iter()
            .map(|topic| {
                logs.entry(topic.clone()).or_default();
                let start = committed
                    .get(&(self.group.clone(), topic.clone()))
                    .copied()
                    .unwrap_or(0);
                (topic.clone(), start)
            })
            .collect();
        self.positions = Some(positions);
        self.cursor = 0;
        tracing::debug!(group = %self.group, ?topics, "subscribed");
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Pin<Box<dyn Future<Output = Result<Polled, StageError>> + Send + '_>> {
        Box::pin(async move {
            let deadline = tokio::time::Instant::now() + timeout;
            let inner = self.inner.clone();
            loop {
                // Register interest before checking so a publish in between is not missed.
                let notified = inner.published.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if let Some(message) = self.next_available()? {
                    return Ok(Polled::Message(message));
                }
                if tokio::time::timeout_at(deadline, notified).await.is_err() {
                    return Ok(Polled::Timeout);
                }
            }
        })
    }

    fn commit(&mut self, message: &ConsumedMessage) -> Result<(), StageError> {
        lock(&self.inner.committed).insert(
            (self.group.clone(), message.topic.clone()),
            message.offset + 1,
        );
        Ok(())
    }

    fn close(&mut self) {
        self.positions = None;
        tracing::debug!(group = %self.group, "consumer closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(20);

    fn topics(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    async fn expect_message(consumer: &mut MemoryConsumer) -> ConsumedMessage {
        match consumer.poll(SHORT).await.unwrap() {
            Polled::Message(m) => m,
            Polled::Timeout => panic!("expected a message, got timeout"),
        }
    }

    #[tokio::test]
    async fn poll_times_out_on_empty_topic() {
        let broker = MemoryBroker::new();
        let mut consumer = broker.consumer("g");
        consumer.subscribe(&topics(&["telemetry"])).unwrap();
        assert_eq!(consumer.poll(SHORT).await.unwrap(), Polled::Timeout);
    }

    #[tokio::test]
    async fn poll_before_subscribe_is_a_state_error() {
        let broker = MemoryBroker::new();
        let mut consumer = broker.consumer("g");
        let err = consumer.poll(SHORT).await.unwrap_err();
        assert_eq!(err.kind(), telemetry_api::ErrorKind::State);
        assert!(err.kind().is_permanent());
    }

    #[test]
    fn publish_is_acknowledged_on_append() {
        assert_eq!(MemoryBroker::new().publisher().delivery(), DeliveryMode::SyncAck);
    }

    #[tokio::test]
    async fn starts_from_earliest_and_keeps_order() {
        let broker = MemoryBroker::new();
        let publisher = broker.publisher();
        publisher.publish("telemetry", Some("T1"), b"a".to_vec()).await.unwrap();
        publisher.publish("telemetry", None, b"b".to_vec()).await.unwrap();

        let mut consumer = broker.consumer("g");
        consumer.subscribe(&topics(&["telemetry"])).unwrap();

        let first = expect_message(&mut consumer).await;
        assert_eq!(first.offset, 0);
        assert_eq!(first.key.as_deref(), Some(&b"T1"[..]));
        assert_eq!(first.payload, b"a");
        let second = expect_message(&mut consumer).await;
        assert_eq!(second.offset, 1);
        assert_eq!(second.key, None);
        assert_eq!(consumer.poll(SHORT).await.unwrap(), Polled::Timeout);
    }

    #[tokio::test]
    async fn waiting_poll_wakes_on_publish() {
        let broker = MemoryBroker::new();
        let mut consumer = broker.consumer("g");
        consumer.subscribe(&topics(&["telemetry"])).unwrap();

        let publisher = broker.publisher();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.publish("telemetry", None, b"late".to_vec()).await.unwrap();
        });

        match consumer.poll(Duration::from_secs(2)).await.unwrap() {
            Polled::Message(m) => assert_eq!(m.payload, b"late"),
            Polled::Timeout => panic!("publish did not wake the poll"),
        }
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn restarted_consumer_resumes_from_commit() {
        let broker = MemoryBroker::new();
        let publisher = broker.publisher();
        for payload in [b"0", b"1", b"2"] {
            publisher.publish("telemetry", None, payload.to_vec()).await.unwrap();
        }

        let mut consumer = broker.consumer("g");
        consumer.subscribe(&topics(&["telemetry"])).unwrap();
        let first = expect_message(&mut consumer).await;
        consumer.commit(&first).unwrap();
        // Read but never committed: redelivered after restart.
        let _second = expect_message(&mut consumer).await;
        consumer.close();
        assert_eq!(broker.committed("g", "telemetry"), Some(1));

        let mut restarted = broker.consumer("g");
        restarted.subscribe(&topics(&["telemetry"])).unwrap();
        assert_eq!(expect_message(&mut restarted).await.payload, b"1");

        let mut other_group = broker.consumer("other");
        other_group.subscribe(&topics(&["telemetry"])).unwrap();
        assert_eq!(expect_message(&mut other_group).await.payload, b"0");
    }

    #[tokio::test]
    async fn consumes_all_subscribed_topics() {
        let broker = MemoryBroker::new();
        let publisher = broker.publisher();
        publisher.publish("a", None, b"from-a".to_vec()).await.unwrap();
        publisher.publish("b", None, b"from-b".to_vec()).await.unwrap();

        let mut consumer = broker.consumer("g");
        consumer.subscribe(&topics(&["a", "b"])).unwrap();
        let mut got = vec![
            expect_message(&mut consumer).await.topic,
            expect_message(&mut consumer).await.topic,
        ];
        got.sort();
        assert_eq!(got, ["a", "b"]);
    }

    #[tokio::test]
    async fn messages_snapshot() {
        let broker = MemoryBroker::new();
        assert!(broker.messages("telemetry").is_empty());
        broker.publisher().publish("telemetry", None, b"x".to_vec()).await.unwrap();
        let retained = broker.messages("telemetry");
        assert_eq!(retained.len(), 1);
        assert_eq!(retained[0].partition, PARTITION);
    }
}
