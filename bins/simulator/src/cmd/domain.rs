use chrono::{DateTime, SecondsFormat, Utc};

use telemetry_api::TelemetryRecord;

// ═══════════════════════════════════════════════════════════════
//  Region
// ═══════════════════════════════════════════════════════════════

/// Bounding box and speed band readings are drawn from.
pub struct Region {
    pub lat: (f64, f64),
    pub long: (f64, f64),
    pub speed: (f64, f64),
}

/// Bengaluru, city traffic.
pub const DEFAULT_REGION: Region = Region {
    lat: (12.90, 13.10),
    long: (77.50, 77.70),
    speed: (20.0, 80.0),
};

impl Region {
    /// One reading for `trip_id` at `at`. Coordinates keep 6 decimals,
    /// speed keeps 2.
    pub fn reading(&self, trip_id: &str, rng: &mut Rng, at: DateTime<Utc>) -> TelemetryRecord {
        TelemetryRecord {
            trip_id: trip_id.to_string(),
            lat: round_to(rng.uniform(self.lat), 6),
            long: round_to(rng.uniform(self.long), 6),
            speed: round_to(rng.uniform(self.speed), 2),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Micros, false),
        }
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Random (v4) trip id drawn from `rng`, so a fixed seed replays the same trips.
pub fn trip_id(rng: &mut Rng) -> String {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&rng.next_u64().to_le_bytes());
    bytes[8..].copy_from_slice(&rng.next_u64().to_le_bytes());
    uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
}

// ═══════════════════════════════════════════════════════════════
//  RNG (xorshift64)
// ═══════════════════════════════════════════════════════════════

pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: i64) -> Self {
        let state = if seed == 0 {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64
                | 1 // ensure non-zero
        } else {
            seed as u64
        };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Returns f64 in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / ((1u64 << 53) as f64)
    }

    pub fn uniform(&mut self, (lo, hi): (f64, f64)) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }
}
