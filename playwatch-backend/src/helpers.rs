use chrono::{DateTime, SubsecRound, Utc};

/// Current UTC time truncated to whole seconds, the granularity the log stores.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Format a duration in seconds as `"{h}h {m}m"`, or `"{m}m"` under an hour.
/// Negative durations are treated as zero.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Like [`format_duration`] with an `" ago"` suffix.
pub fn format_ago(seconds: i64) -> String {
    format!("{} ago", format_duration(seconds))
}
