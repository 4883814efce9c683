use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Player id as reported by the directory (opaque string).
pub type PlayerId = String;

/// One closed session in a player's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
  /// Whole minutes between `start` and `end`, truncated.
  pub playtime_minutes: i64,
}

impl SessionEntry {
  /// Build an entry spanning `start..end`. An `end` earlier than `start`
  /// (clock skew) collapses to a zero-length session.
  pub fn spanning(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
    let end = end.max(start);
    Self {
      start,
      end,
      playtime_minutes: (end - start).num_minutes(),
    }
  }
}

/// Persisted per-player state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
  pub name: String,
  /// Cumulative playtime as last reported by the directory.
  pub total_playtime_minutes: i64,
  /// Set iff the player is currently considered online.
  pub current_session_start: Option<DateTime<Utc>>,
  #[serde(default)]
  pub session_history: Vec<SessionEntry>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_logged_off: Option<DateTime<Utc>>,
}

impl PlayerRecord {
  /// A freshly seen player with a session opened at `now`.
  pub fn first_seen(name: String, total_playtime_minutes: i64, now: DateTime<Utc>) -> Self {
    Self {
      name,
      total_playtime_minutes,
      current_session_start: Some(now),
      session_history: Vec::new(),
      last_logged_off: None,
    }
  }

  pub fn is_online(&self) -> bool {
    self.current_session_start.is_some()
  }
}

/// Root persisted document: `{ "players": { <id>: PlayerRecord } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
  #[serde(default)]
  pub players: BTreeMap<PlayerId, PlayerRecord>,
}

impl Log {
  pub fn new() -> Self {
    Self::default()
  }
}

/// A player reported online by one poll, with their server-scoped playtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollEntry {
  pub player_id: PlayerId,
  pub name: String,
  pub playtime_minutes: i64,
  /// When the detail was fetched (cached entries keep their original stamp).
  pub timestamp: DateTime<Utc>,
}

/// Which of the two summary messages a reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryKind {
  Online,
  Offline,
}

impl SummaryKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      SummaryKind::Online => "online",
      SummaryKind::Offline => "offline",
    }
  }

  pub(crate) fn file_name(&self) -> &'static str {
    match self {
      SummaryKind::Online => "online_message_id.txt",
      SummaryKind::Offline => "offline_message_id.txt",
    }
  }
}
