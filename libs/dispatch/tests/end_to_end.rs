use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use broker_memory::MemoryBroker;
use dispatch::{DispatchConfig, DispatchLoop, DispatchStats, spawn_dispatch};
use ingest_api::{IngestState, router};
use storage_memory::MemorySink;
use telemetry_api::{
    CONSUMER_GROUP, CommitPolicy, TelemetryConsumer, TelemetryPublisher,
    TelemetryRecord,
};

const TOPIC: &str = "vehicle-telemetry";
const SCENARIO: &str = r#"{"trip_id":"T1","lat":12.9,"long":77.6,"speed":40.5,"timestamp":"2024-01-01T00:00:00Z"}"#;

fn ingest(broker: &MemoryBroker) -> axum::Router {
    router(IngestState {
        publisher: Arc::new(broker.publisher()),
        topic: TOPIC.into(),
        key_by_trip: true,
    })
}

async fn post(app: &axum::Router, body: &str) -> StatusCode {
    let request = Request::builder()
        .method("POST")
        .uri("/telemetry")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}

/// Run the dispatch loop until the sink holds `expected` rows (or a deadline
/// passes), then cancel it and return its stats.
async fn drain(broker: &MemoryBroker, sink: Arc<MemorySink>, expected: usize) -> DispatchStats {
    let mut consumer = broker.consumer(CONSUMER_GROUP);
    consumer.subscribe(&[TOPIC.to_string()]).unwrap();

    let token = CancellationToken::new();
    let config = DispatchConfig {
        poll_timeout: Duration::from_millis(10),
        commit: CommitPolicy::AfterStore,
    };
    let handle = spawn_dispatch(DispatchLoop::new(Box::new(consumer), sink.clone(), config), token.clone());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while sink.len().await < expected && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    // Give the loop a few more polls to show nothing else arrives.
    tokio::time::sleep(Duration::from_millis(30)).await;
    token.cancel();
    handle.await.unwrap()
}

#[tokio::test]
async fn ingested_reading_is_stored_with_identical_fields() {
    let broker = MemoryBroker::new();
    let app = ingest(&broker);

    assert_eq!(post(&app, SCENARIO).await, StatusCode::OK);

    let messages = broker.messages(TOPIC);
    assert_eq!(messages.len(), 1);
    let sent: serde_json::Value = serde_json::from_str(SCENARIO).unwrap();
    let on_wire: serde_json::Value = serde_json::from_slice(&messages[0].payload).unwrap();
    assert_eq!(on_wire, sent);

    let sink = Arc::new(MemorySink::new(100));
    let stats = drain(&broker, sink.clone(), 1).await;

    assert_eq!(stats.stored, 1);
    assert_eq!(
        sink.records().await,
        vec![TelemetryRecord {
            trip_id: "T1".into(),
            lat: 12.9,
            long: 77.6,
            speed: 40.5,
            timestamp: "2024-01-01T00:00:00Z".into(),
        }]
    );
    assert_eq!(broker.committed(CONSUMER_GROUP, TOPIC), Some(1));
}

#[tokio::test]
async fn malformed_reading_produces_no_message() {
    let broker = MemoryBroker::new();
    let app = ingest(&broker);

    assert_eq!(post(&app, r#"{"lat": "not-a-number"}"#).await, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(broker.messages(TOPIC).is_empty());
}

#[tokio::test]
async fn non_json_message_is_skipped_and_loop_continues() {
    let broker = MemoryBroker::new();
    let publisher = broker.publisher();
    publisher.publish(TOPIC, None, b"\x00garbage\xff".to_vec()).await.unwrap();

    let app = ingest(&broker);
    assert_eq!(post(&app, SCENARIO).await, StatusCode::OK);

    let sink = Arc::new(MemorySink::new(100));
    let stats = drain(&broker, sink.clone(), 1).await;

    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.stored, 1);
    assert_eq!(sink.records().await[0].trip_id, "T1");
}

#[tokio::test]
async fn uncommitted_reading_is_redelivered_after_restart() {
    let broker = MemoryBroker::new();
    let app = ingest(&broker);
    assert_eq!(post(&app, SCENARIO).await, StatusCode::OK);

    // A consumer that reads but dies before storing: nothing is committed.
    let mut crashed = broker.consumer(CONSUMER_GROUP);
    crashed.subscribe(&[TOPIC.to_string()]).unwrap();
    crashed.poll(Duration::from_millis(10)).await.unwrap();
    drop(crashed);
    assert_eq!(broker.committed(CONSUMER_GROUP, TOPIC), None);

    let sink = Arc::new(MemorySink::new(100));
    let stats = drain(&broker, sink.clone(), 1).await;
    assert_eq!(stats.stored, 1);

    // Replaying after the commit stores nothing new.
    let again = drain(&broker, sink.clone(), 1).await;
    assert_eq!(again.stored, 0);
    assert_eq!(sink.len().await, 1);
}
