//! Ranked "online" and "recently offline" lists and their rendered form.

use chrono::{DateTime, Utc};
use playwatch_db::Log;

use crate::helpers::{format_ago, format_duration};

/// Discord caps embed field values at 1024 characters.
pub const FIELD_VALUE_LIMIT: usize = 1024;

pub const ONLINE_COLOR: u32 = 0x00ff00;
pub const OFFLINE_COLOR: u32 = 0xff0000;
pub const FOOTER: &str = "Player status updates every minute";

/// One ranked line of a summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub name: String,
    /// Human readable duration, e.g. `"1h 5m"` or `"3m ago"`.
    pub display: String,
    /// Raw seconds behind `display`.
    pub elapsed_secs: i64,
}

/// Players with an open session, longest online first, at most `limit` rows.
pub fn online_list(log: &Log, now: DateTime<Utc>, limit: usize) -> Vec<SummaryRow> {
    let mut rows: Vec<SummaryRow> = log
        .players
        .values()
        .filter_map(|record| {
            let start = record.current_session_start?;
            let elapsed_secs = (now - start).num_seconds().max(0);
            Some(SummaryRow {
                name: record.name.clone(),
                display: format_duration(elapsed_secs),
                elapsed_secs,
            })
        })
        .collect();
    // sort_by is stable, so ties keep log order
    rows.sort_by(|a, b| b.elapsed_secs.cmp(&a.elapsed_secs));
    rows.truncate(limit);
    rows
}

/// Offline players with a recorded log-off, most recent first, at most `limit` rows.
pub fn recent_offline_list(log: &Log, now: DateTime<Utc>, limit: usize) -> Vec<SummaryRow> {
    let mut rows: Vec<SummaryRow> = log
        .players
        .values()
        .filter(|record| !record.is_online())
        .filter_map(|record| {
            let logged_off = record.last_logged_off?;
            let elapsed_secs = (now - logged_off).num_seconds().max(0);
            Some(SummaryRow {
                name: record.name.clone(),
                display: format_ago(elapsed_secs),
                elapsed_secs,
            })
        })
        .collect();
    rows.sort_by(|a, b| a.elapsed_secs.cmp(&b.elapsed_secs));
    rows.truncate(limit);
    rows
}

/// Platform-neutral embed content for one summary message.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSummary {
    pub title: String,
    pub description: String,
    /// `(names, times)` columns, already wrapped in code blocks.
    pub columns: Option<(String, String)>,
    pub footer: String,
    pub color: u32,
    pub timestamp: DateTime<Utc>,
}

pub fn render_online(rows: &[SummaryRow], total_online: usize, now: DateTime<Utc>) -> RenderedSummary {
    RenderedSummary {
        title: "Online Players".to_string(),
        description: format!("Total Online Players: {}", total_online),
        columns: columns(rows),
        footer: FOOTER.to_string(),
        color: ONLINE_COLOR,
        timestamp: now,
    }
}

pub fn render_offline(rows: &[SummaryRow], now: DateTime<Utc>) -> RenderedSummary {
    RenderedSummary {
        title: "Recent Log Offs".to_string(),
        description: String::new(),
        columns: columns(rows),
        footer: FOOTER.to_string(),
        color: OFFLINE_COLOR,
        timestamp: now,
    }
}

/// Build the names and times columns, dropping trailing rows until both fit
/// in a field. Both columns always hold the same rows.
fn columns(rows: &[SummaryRow]) -> Option<(String, String)> {
    if rows.is_empty() {
        return None;
    }
    let names: Vec<String> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| format!("{}. {}", i + 1, row.name))
        .collect();
    let times: Vec<&str> = rows.iter().map(|row| row.display.as_str()).collect();

    let mut count = rows.len();
    loop {
        let name_block = code_block(&names[..count]);
        let time_block = code_block(&times[..count]);
        if (name_block.chars().count() <= FIELD_VALUE_LIMIT
            && time_block.chars().count() <= FIELD_VALUE_LIMIT)
            || count == 1
        {
            return Some((name_block, time_block));
        }
        count -= 1;
    }
}

fn code_block<S: AsRef<str>>(lines: &[S]) -> String {
    let body = lines
        .iter()
        .map(|line| line.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    format!("```{}```", body)
}
