use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::RwLock;

use telemetry_api::{StageError, TelemetryRecord, TelemetrySink};

// ═══════════════════════════════════════════════════════════════
//  MemorySinkConfig
// ═══════════════════════════════════════════════════════════════

fn default_max_records() -> usize {
    100_000
}

#[derive(Debug, serde::Deserialize)]
pub struct MemorySinkConfig {
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

impl Default for MemorySinkConfig {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
        }
    }
}

impl MemorySinkConfig {
    /// A zero-capacity sink would acknowledge records it never keeps.
    pub fn validate(&self) -> Result<(), StageError> {
        if self.max_records == 0 {
            return Err(StageError::config("memory sink max_records must be at least 1"));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemorySink
// ═══════════════════════════════════════════════════════════════

/// In-memory ring buffer of stored records. For dry runs and tests
/// where no database is available; the oldest rows are evicted first.
pub struct MemorySink {
    records: RwLock<VecDeque<TelemetryRecord>>,
    max_records: usize,
}

impl MemorySink {
    /// `max_records` below 1 is raised to 1.
    pub fn new(max_records: usize) -> Self {
        let max_records = max_records.max(1);
        Self {
            records: RwLock::new(VecDeque::with_capacity(max_records.min(65536))),
            max_records,
        }
    }

    pub fn from_config(config: &MemorySinkConfig) -> Result<Self, StageError> {
        config.validate()?;
        Ok(Self::new(config.max_records))
    }

    /// Stored rows, oldest first.
    pub async fn records(&self) -> Vec<TelemetryRecord> {
        self.records.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl TelemetrySink for MemorySink {
    fn init(&self) -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn store<'a>(&'a self, record: &'a TelemetryRecord)
        -> Pin<Box<dyn Future<Output = Result<(), StageError>> + Send + 'a>>
    {
        Box::pin(async move {
            let mut buf = self.records.write().await;
            if buf.len() >= self.max_records {
                buf.pop_front();
            }
            buf.push_back(record.clone());
            Ok(())
        })
    }
}
