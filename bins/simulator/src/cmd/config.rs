use std::time::Duration;

use clap::Args;

use super::error::SimulatorError;

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct SimArgs {
    /// Base URL of the ingest API
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "INGEST_URL")]
    pub url: String,

    /// Number of trips to simulate
    #[arg(long, default_value_t = 3)]
    pub trips: usize,

    /// Readings per trip
    #[arg(long, default_value_t = 10)]
    pub points: usize,

    /// Pause between readings in ms
    #[arg(long, default_value_t = 1000)]
    pub delay_ms: u64,

    /// PRNG seed (0 = current time)
    #[arg(long, default_value_t = 0)]
    pub seed: i64,
}

/// Validated run parameters.
#[derive(Debug, Clone)]
pub struct Effective {
    pub base_url: String,
    pub trips: usize,
    pub points: usize,
    pub delay: Duration,
    pub seed: i64,
}

impl Effective {
    pub fn new(args: &SimArgs) -> Result<Self, SimulatorError> {
        let base_url = args.url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SimulatorError::Config(format!("ingest url must be http(s): '{}'", args.url)));
        }
        if args.trips == 0 || args.points == 0 {
            return Err(SimulatorError::Config("--trips and --points must be positive".into()));
        }
        Ok(Self {
            base_url,
            trips: args.trips,
            points: args.points,
            delay: Duration::from_millis(args.delay_ms),
            seed: args.seed,
        })
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }

    pub fn telemetry_url(&self) -> String {
        format!("{}/telemetry", self.base_url)
    }
}
