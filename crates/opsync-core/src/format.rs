//! Display formatting helpers shared by the flow aggregation layer.

use crate::constants::SNAPSHOT_ID_DISPLAY_LEN;

const BYTE_UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

/// Format a byte count with binary units, rounded to two decimals.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value > 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", (value * 100.0).round() / 100.0, BYTE_UNITS[unit])
}

/// Format a millisecond duration as a compact `XhYmZs` string.
/// Sub-second durations round up to one second.
pub fn format_duration(ms: i64) -> String {
    let seconds = (ms.max(0) + 999) / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    let mut parts: Vec<String> = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes % 60 > 0 {
        parts.push(format!("{}m", minutes % 60));
    }
    if seconds % 60 > 0 || parts.is_empty() {
        parts.push(format!("{}s", seconds % 60));
    }
    parts.concat()
}

/// Truncate a snapshot id to its display form (first 8 characters).
/// A display convention only; full ids remain the lookup key elsewhere.
pub fn normalize_snapshot_id(id: &str) -> &str {
    id.get(..SNAPSHOT_ID_DISPLAY_LEN).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_use_binary_units() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3 MiB");
    }

    #[test]
    fn durations_round_seconds_up() {
        assert_eq!(format_duration(1), "1s");
        assert_eq!(format_duration(1000), "1s");
        assert_eq!(format_duration(61_000), "1m1s");
        assert_eq!(format_duration(3_600_000), "1h");
        assert_eq!(format_duration(3_725_000), "1h2m5s");
        assert_eq!(format_duration(0), "0s");
    }

    #[test]
    fn snapshot_ids_truncate_to_eight_chars() {
        assert_eq!(normalize_snapshot_id("a1b2c3d4e5f6a7b8"), "a1b2c3d4");
        assert_eq!(normalize_snapshot_id("abcd"), "abcd");
    }
}
