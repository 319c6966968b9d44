//! Human-readable durations and progress text.

/// `HH:MM:SS`, each field zero-padded to two digits. Fractions of a second
/// are dropped; negative input reads as zero.
pub fn format_hms(seconds: f64) -> String {
    let total = whole_seconds(seconds);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Compact form used in history listings: `"16h 5m"`, or `"42m"` under an hour.
pub fn format_hours_minutes(seconds: f64) -> String {
    let total = whole_seconds(seconds);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Status line for a running fast at `progress` (0.0 ..= 1.0).
pub fn progress_status(progress: f64) -> String {
    if progress >= 1.0 {
        "Goal reached!".to_string()
    } else {
        let percentage = (progress * 100.0).floor() as u64;
        format!("{percentage}% of target")
    }
}

fn whole_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    }
}
