use std::time::{Duration, Instant};

use playwatch_db::PollEntry;
use scc::HashMap;

#[derive(Clone)]
struct CacheEntry {
    entry: PollEntry,
    fetched_at: Instant,
}

/// In-memory cache of player details with a fixed TTL.
/// Never persisted; a restart simply refetches.
pub struct DetailCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
}

impl DetailCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh cached detail for a player, if any.
    pub async fn get(&self, player_id: &str) -> Option<PollEntry> {
        self.get_at(player_id, Instant::now()).await
    }

    async fn get_at(&self, player_id: &str, now: Instant) -> Option<PollEntry> {
        self.entries
            .read_async(player_id, |_, cached| {
                (now.saturating_duration_since(cached.fetched_at) < self.ttl)
                    .then(|| cached.entry.clone())
            })
            .await
            .flatten()
    }

    /// Store or refresh a player's detail.
    pub async fn insert(&self, entry: PollEntry) {
        self.insert_at(entry, Instant::now()).await;
    }

    async fn insert_at(&self, entry: PollEntry, fetched_at: Instant) {
        let cached = CacheEntry { entry, fetched_at };
        self.entries
            .entry_async(cached.entry.player_id.clone())
            .await
            .insert_entry(cached);
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain_async(|_, cached| now.saturating_duration_since(cached.fetched_at) < self.ttl)
            .await;
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
