use std::time::Duration;

use telemetry_api::CommitPolicy;

/// Default bound for a single broker poll.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    /// Upper bound of one poll; also the worst-case shutdown latency.
    pub poll_timeout: Duration,
    pub commit: CommitPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            commit: CommitPolicy::default(),
        }
    }
}
