use std::time::Duration;

use crate::constants::{DEBOUNCE_WINDOW, STREAM_RETRY_MIN_INTERVAL};

/// Tunables shared by the stream reconcilers. The defaults match the
/// behavior of the production service; tests shrink the intervals.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiescence window for the peer-state debounced broadcast.
    pub debounce_window: Duration,
    /// Floor between push-stream connection attempts.
    pub stream_retry_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_window: DEBOUNCE_WINDOW,
            stream_retry_interval: STREAM_RETRY_MIN_INTERVAL,
        }
    }
}
