use std::time::Duration;

use chrono::Utc;

use super::config::Effective;
use super::domain::{DEFAULT_REGION, Rng, trip_id};
use super::error::SimulatorError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub sent: usize,
    pub failed: usize,
}

pub async fn run(eff: &Effective) -> Result<Summary, SimulatorError> {
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

    // --- Health check: refuse to start against a dead API ---
    let health_url = eff.health_url();
    let health = client.get(&health_url).send().await.map_err(|e| SimulatorError::Health {
        url: health_url.clone(),
        detail: e.to_string(),
    })?;
    if !health.status().is_success() {
        return Err(SimulatorError::Health { url: health_url, detail: health.status().to_string() });
    }
    tracing::info!(url = %eff.base_url, "ingest api is healthy");

    let url = eff.telemetry_url();
    let mut rng = Rng::new(eff.seed);
    let mut summary = Summary::default();

    for _ in 0..eff.trips {
        let trip = trip_id(&mut rng);
        tracing::info!(trip_id = %trip, points = eff.points, "starting trip");

        for point in 0..eff.points {
            let reading = DEFAULT_REGION.reading(&trip, &mut rng, Utc::now());
            match client.post(&url).json(&reading).send().await {
                Ok(resp) if resp.status().is_success() => {
                    summary.sent += 1;
                    tracing::info!(
                        trip_id = %trip,
                        point,
                        lat = reading.lat,
                        long = reading.long,
                        speed = reading.speed,
                        "sent"
                    );
                }
                Ok(resp) => {
                    summary.failed += 1;
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    tracing::warn!(trip_id = %trip, point, %status, %body, "rejected");
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(trip_id = %trip, point, error = %e, "send failed");
                }
            }
            if !eff.delay.is_zero() {
                tokio::time::sleep(eff.delay).await;
            }
        }
    }

    tracing::info!(sent = summary.sent, failed = summary.failed, "simulation finished");
    Ok(summary)
}
