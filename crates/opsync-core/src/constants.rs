//! Application-wide constants
//!
//! Centralized location for magic values that are used across
//! multiple modules.

use std::time::Duration;

/// Quiescence window for debounced broadcasts. Rapid bursts of upserts
/// within this window coalesce into a single delivery to subscribers.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// Minimum interval between attempts to (re)open a server push stream.
/// The floor is measured from the moment the previous attempt started,
/// not from when it failed.
pub const STREAM_RETRY_MIN_INTERVAL: Duration = Duration::from_millis(5000);

/// Snapshot ids are truncated to this many characters for display.
/// A display convention only - lookups elsewhere use the full id.
pub const SNAPSHOT_ID_DISPLAY_LEN: usize = 8;

/// Operations that complete faster than this don't get a "took <duration>"
/// subtitle, to avoid noise on instantaneous operations.
pub const DURATION_SUBTITLE_FLOOR_MS: i64 = 100;
