use serde::{Deserialize, Deserializer, Serialize};

use crate::StageError;

// ═══════════════════════════════════════════════════════════════
//  TelemetryRecord
// ═══════════════════════════════════════════════════════════════

/// One vehicle telemetry reading.
///
/// The same JSON shape is used on the ingest API, as the broker message
/// value and as the source of a storage row. Values are not validated:
/// `trip_id` and `timestamp` are opaque text, coordinates and speed are
/// accepted with any sign or range.
///
/// Decoding follows the *partial-decode-is-success* policy: a missing field
/// or an explicit `null` becomes the zero value, unknown fields are ignored.
/// Only a field of the wrong JSON type, or a payload that does not
/// deserialize into a record at all, fails to decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub trip_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lat: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub long: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub speed: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
}

impl TelemetryRecord {
    /// UTF-8 JSON encoding used as the broker message value.
    pub fn encode(&self) -> Result<Vec<u8>, StageError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a broker message value. Errors carry `ErrorKind::Format`.
    pub fn decode(bytes: &[u8]) -> Result<Self, StageError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Broker partition key: the trip id, when there is one.
    pub fn partition_key(&self) -> Option<&str> {
        if self.trip_id.is_empty() {
            None
        } else {
            Some(&self.trip_id)
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
