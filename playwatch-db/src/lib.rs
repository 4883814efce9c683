mod error;
pub mod ledger;
mod models;

pub use error::{Result, StoreError};
pub use ledger::{MergeReport, merge};
pub use models::{Log, PlayerId, PlayerRecord, PollEntry, SessionEntry, SummaryKind};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// File name of the persisted session log inside the data directory.
pub const LOG_FILE_NAME: &str = "player_playtime.json";

/// File-backed storage for the session log and the two message references.
#[derive(Clone)]
pub struct Store {
  inner: Arc<Inner>,
}

struct Inner {
  dir: PathBuf,
  log_path: PathBuf,
  /// Serialises load-merge-save so overlapping cycles cannot lose updates.
  writer: Mutex<()>,
}

impl Store {
  /// Open (and create if needed) a store rooted at `dir`.
  pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
    let dir = dir.as_ref().to_path_buf();
    fs::create_dir_all(&dir).await?;
    let log_path = dir.join(LOG_FILE_NAME);
    info!(path = %log_path.display(), "store opened");
    Ok(Self {
      inner: Arc::new(Inner {
        dir,
        log_path,
        writer: Mutex::new(()),
      }),
    })
  }

  pub fn log_path(&self) -> &Path {
    &self.inner.log_path
  }

  // ========================================================================
  // Session log
  // ========================================================================

  /// Load the log. A missing or unreadable file yields an empty log.
  pub async fn load_log(&self) -> Log {
    let path = &self.inner.log_path;
    let bytes = match fs::read(path).await {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        debug!(path = %path.display(), "no log file yet, starting empty");
        return Log::new();
      }
      Err(e) => {
        warn!(path = %path.display(), error = %e, "failed to read log, starting empty");
        return Log::new();
      }
    };

    match serde_json::from_slice::<Log>(&bytes) {
      Ok(log) => log,
      Err(e) => {
        warn!(path = %path.display(), error = %e, "failed to decode log, starting empty");
        Log::new()
      }
    }
  }

  /// Rewrite the whole log. Written to a temp file first and renamed into place.
  pub async fn save_log(&self, log: &Log) -> Result<()> {
    let path = &self.inner.log_path;
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(log)?;
    fs::write(&tmp, &bytes).await?;
    fs::rename(&tmp, path).await?;
    debug!(path = %path.display(), players = log.players.len(), "log saved");
    Ok(())
  }

  /// Load the log, apply `f`, and save the result while holding the writer lock.
  pub async fn update<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut Log) -> R,
  {
    let _guard = self.inner.writer.lock().await;
    let mut log = self.load_log().await;
    let result = f(&mut log);
    self.save_log(&log).await?;
    Ok(result)
  }

  // ========================================================================
  // Message references
  // ========================================================================

  fn message_ref_path(&self, kind: SummaryKind) -> PathBuf {
    self.inner.dir.join(kind.file_name())
  }

  /// The chat message id on record for `kind`, if any.
  pub async fn message_ref(&self, kind: SummaryKind) -> Option<u64> {
    let path = self.message_ref_path(kind);
    let raw = match fs::read_to_string(&path).await {
      Ok(raw) => raw,
      Err(e) if e.kind() == ErrorKind::NotFound => return None,
      Err(e) => {
        warn!(kind = kind.as_str(), error = %e, "failed to read message reference");
        return None;
      }
    };
    match parse_message_ref(&raw) {
      Ok(id) => Some(id),
      Err(e) => {
        warn!(kind = kind.as_str(), error = %e, "ignoring message reference");
        None
      }
    }
  }

  pub async fn set_message_ref(&self, kind: SummaryKind, message_id: u64) -> Result<()> {
    fs::write(self.message_ref_path(kind), message_id.to_string()).await?;
    debug!(kind = kind.as_str(), message_id, "message reference saved");
    Ok(())
  }

  /// Forget the message id on record. Clearing an absent reference is a no-op.
  pub async fn clear_message_ref(&self, kind: SummaryKind) -> Result<()> {
    match fs::remove_file(self.message_ref_path(kind)).await {
      Ok(()) => {
        debug!(kind = kind.as_str(), "message reference cleared");
        Ok(())
      }
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }

  /// Record `message_id` only when no reference exists yet.
  /// Returns true if the seed was written.
  pub async fn seed_message_ref(&self, kind: SummaryKind, message_id: u64) -> Result<bool> {
    if self.message_ref(kind).await.is_some() {
      return Ok(false);
    }
    self.set_message_ref(kind, message_id).await?;
    info!(kind = kind.as_str(), message_id, "seeded message reference");
    Ok(true)
  }
}

fn parse_message_ref(raw: &str) -> Result<u64> {
  let trimmed = raw.trim();
  match trimmed.parse::<u64>() {
    Ok(id) if id != 0 => Ok(id),
    _ => Err(StoreError::InvalidMessageRef(trimmed.to_string())),
  }
}
