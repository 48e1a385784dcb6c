use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use telemetry_api::{DeliveryMode, TelemetryRecord};

use super::IngestState;

#[derive(Serialize)]
struct MessageBody {
    message: String,
}

fn reply(status: StatusCode, message: impl Into<String>) -> Response {
    (status, axum::Json(MessageBody { message: message.into() })).into_response()
}

// ═══════════════════════════════════════════════════════════════
//  POST /telemetry
// ═══════════════════════════════════════════════════════════════

/// Parse one reading, re-encode it and hand it to the publisher.
///
/// The body is parsed directly rather than through the `Json` extractor so
/// that every unparseable body maps to 422, whatever its content type.
pub(crate) async fn handle_telemetry(
    State(state): State<IngestState>,
    body: Bytes,
) -> Response {
    let record = match TelemetryRecord::decode(&body) {
        Ok(record) => record,
        Err(e) => {
            tracing::debug!(error = %e, "rejecting telemetry body");
            return reply(StatusCode::UNPROCESSABLE_ENTITY, "request failed");
        }
    };

    let payload = match record.encode() {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(trip_id = %record.trip_id, error = ?e, "failed to encode telemetry");
            return reply(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process telemetry");
        }
    };

    let key = if state.key_by_trip { record.partition_key() } else { None };
    if let Err(e) = state.publisher.publish(&state.topic, key, payload).await {
        match state.publisher.delivery() {
            // Not surfaced to the caller in fire-and-forget mode.
            DeliveryMode::FireAndForget => {
                tracing::warn!(topic = %state.topic, trip_id = %record.trip_id, error = ?e, "publish failed");
            }
            DeliveryMode::SyncAck => {
                tracing::error!(topic = %state.topic, trip_id = %record.trip_id, error = ?e, "publish failed");
                return reply(StatusCode::SERVICE_UNAVAILABLE, "Failed to publish telemetry");
            }
        }
    }

    reply(
        StatusCode::OK,
        format!("Telemetry sent to kafka topic {} successfully", state.topic),
    )
}

// ═══════════════════════════════════════════════════════════════
//  GET /health
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_health() -> impl IntoResponse {
    "OK"
}
