use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════
//  Delivery Mode
// ════════════════════════════════════════════════════════════════

/// How the ingest side waits for the broker when publishing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Enqueue in the producer and return; the delivery report is ignored.
    #[default]
    #[serde(alias = "fire-and-forget")]
    FireAndForget,
    /// Wait for the broker acknowledgment before answering the caller.
    #[serde(alias = "sync-ack")]
    SyncAck,
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMode::FireAndForget => f.write_str("fire_and_forget"),
            DeliveryMode::SyncAck => f.write_str("sync_ack"),
        }
    }
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fire_and_forget" | "fire-and-forget" => Ok(DeliveryMode::FireAndForget),
            "sync_ack" | "sync-ack" => Ok(DeliveryMode::SyncAck),
            other => Err(format!("unknown delivery mode '{other}' (expected fire_and_forget or sync_ack)")),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Commit Policy
// ════════════════════════════════════════════════════════════════

/// When consumer offsets are committed back to the broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Client auto-commit disabled; the dispatch loop commits a message
    /// only after the sink stored it. Dropped messages are not committed.
    #[default]
    #[serde(alias = "after-store")]
    AfterStore,
    /// Periodic auto-commit by the broker client; the loop never commits.
    Auto,
}

impl std::fmt::Display for CommitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitPolicy::AfterStore => f.write_str("after_store"),
            CommitPolicy::Auto => f.write_str("auto"),
        }
    }
}

impl FromStr for CommitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "after_store" | "after-store" => Ok(CommitPolicy::AfterStore),
            "auto" => Ok(CommitPolicy::Auto),
            other => Err(format!("unknown commit policy '{other}' (expected after_store or auto)")),
        }
    }
}
