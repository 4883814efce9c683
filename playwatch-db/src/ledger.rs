//! Session tracking.
//!
//! Each poll produces the set of players the directory reports online. Merging
//! that set into the [`Log`] opens sessions for newly seen players and closes
//! sessions for players that disappeared, appending the closed interval to
//! their history.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{Log, PlayerRecord, PollEntry, SessionEntry};

/// What a single merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
  /// Players seen for the first time.
  pub new_players: usize,
  /// Sessions opened (includes new players).
  pub opened: usize,
  /// Sessions that stayed open across this poll.
  pub continued: usize,
  /// Sessions closed because the player was missing from the poll.
  pub closed: usize,
}

/// Merge one poll's online players into `log` at the single instant `now`.
///
/// Every player in `snapshot` ends with an open session. Every player in the
/// log that is missing from `snapshot` and had an open session gets it closed
/// at `now`. Players already offline are left untouched.
pub fn merge(log: &mut Log, snapshot: &[PollEntry], now: DateTime<Utc>) -> MergeReport {
  let mut report = MergeReport::default();
  let mut seen: HashSet<&str> = HashSet::with_capacity(snapshot.len());

  for entry in snapshot {
    seen.insert(entry.player_id.as_str());

    match log.players.get_mut(&entry.player_id) {
      None => {
        log.players.insert(
          entry.player_id.clone(),
          PlayerRecord::first_seen(entry.name.clone(), entry.playtime_minutes, now),
        );
        report.new_players += 1;
        report.opened += 1;
        debug!(player_id = %entry.player_id, name = %entry.name, "new player, session opened");
      }
      Some(record) => {
        if record.current_session_start.is_none() {
          record.current_session_start = Some(now);
          report.opened += 1;
          debug!(player_id = %entry.player_id, name = %entry.name, "session opened");
        } else {
          report.continued += 1;
        }
        // The directory's cumulative value is authoritative.
        record.total_playtime_minutes = entry.playtime_minutes;
        if record.name != entry.name {
          record.name.clone_from(&entry.name);
        }
      }
    }
  }

  for (player_id, record) in log.players.iter_mut() {
    if seen.contains(player_id.as_str()) {
      continue;
    }
    if let Some(start) = record.current_session_start.take() {
      push_session(&mut record.session_history, SessionEntry::spanning(start, now));
      record.last_logged_off = Some(now);
      report.closed += 1;
      debug!(%player_id, name = %record.name, "session closed");
    }
  }

  report
}

/// Append `entry` unless the history already ends with the same interval.
fn push_session(history: &mut Vec<SessionEntry>, entry: SessionEntry) {
  let duplicate = history
    .last()
    .is_some_and(|last| last.end == entry.end && last.start == entry.start);
  if !duplicate {
    history.push(entry);
  }
}
