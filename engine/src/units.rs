//! Human-readable sizes and durations for reports and progress lines.

use std::time::Duration;

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;

/// Format a byte count with an auto-scaled unit (bytes, KB, MB, GB).
///
/// Values are rounded to two decimals with trailing zeros dropped, so
/// `500 * 1024 * 1024` renders as `500 MB` and `1536` as `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    let value = bytes as f64;
    if value >= GB {
        format!("{} GB", trim_decimals(value / GB))
    } else if value >= MB {
        format!("{} MB", trim_decimals(value / MB))
    } else if value >= KB {
        format!("{} KB", trim_decimals(value / KB))
    } else {
        format!("{} bytes", bytes)
    }
}

fn trim_decimals(value: f64) -> String {
    let rounded = format!("{:.2}", value);
    rounded
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Format an elapsed time as `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
