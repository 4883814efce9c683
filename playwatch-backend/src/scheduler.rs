//! The two periodic poll cycles.
//!
//! The fast cycle lists players, merges them into the log and refreshes both
//! summary messages. The slow cycle only lists and merges. Both go through
//! [`Store::update`], so their load-merge-save steps never interleave.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use playwatch_db::{Log, MergeReport, PollEntry, Result, Store, SummaryKind, merge};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::directory::DirectoryClient;
use crate::helpers::now;
use crate::sink::{MessageApi, MessageSink};
use crate::summary::{online_list, recent_offline_list, render_offline, render_online};

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Players returned by the listing.
    pub listed: usize,
    /// Players with a usable detail (the merged snapshot).
    pub online: usize,
    pub merge: MergeReport,
}

pub struct Poller<A> {
    client: Arc<DirectoryClient>,
    store: Store,
    sink: MessageSink<A>,
    server_id: String,
    online_limit: usize,
    offline_limit: usize,
}

impl<A: MessageApi> Poller<A> {
    pub fn new(
        client: Arc<DirectoryClient>,
        store: Store,
        sink: MessageSink<A>,
        config: &Config,
    ) -> Self {
        Self {
            client,
            store,
            sink,
            server_id: config.server_id.clone(),
            online_limit: config.online_list_limit,
            offline_limit: config.offline_list_limit,
        }
    }

    pub fn sink(&self) -> &MessageSink<A> {
        &self.sink
    }

    /// List online players and fetch every detail. Returns only once all
    /// detail fetches have finished.
    async fn collect_snapshot(&self) -> (usize, Vec<PollEntry>) {
        let pruned = self.client.cache().purge_expired().await;
        if pruned > 0 {
            debug!(pruned, "expired detail cache entries dropped");
        }
        let players = self.client.list_online_players(&self.server_id).await;
        let listed = players.len();
        let snapshot = self.client.fetch_snapshot(players, &self.server_id).await;
        (listed, snapshot)
    }

    /// Fetch a snapshot and merge it into the persisted log.
    async fn merge_snapshot(&self) -> Result<(TickReport, Log)> {
        let (listed, snapshot) = self.collect_snapshot().await;
        let merged_at = now();
        let (merge_report, log) = self
            .store
            .update(|log| (merge(log, &snapshot, merged_at), log.clone()))
            .await?;
        let report = TickReport {
            listed,
            online: snapshot.len(),
            merge: merge_report,
        };
        Ok((report, log))
    }

    /// Slow cycle: list, merge, persist.
    pub async fn refresh_ledger(&self) -> Result<TickReport> {
        let (report, _) = self.merge_snapshot().await?;
        Ok(report)
    }

    /// Fast cycle: list, merge, persist, then push both summaries.
    pub async fn refresh_all(&self) -> Result<TickReport> {
        let (report, log) = self.merge_snapshot().await?;
        self.publish(&log).await;
        Ok(report)
    }

    /// Render both summaries from `log` and upsert them. Sink failures are
    /// logged and do not fail the tick.
    pub async fn publish(&self, log: &Log) {
        let rendered_at = now();
        let online = online_list(log, rendered_at, usize::MAX);
        let total_online = online.len();
        let online = &online[..total_online.min(self.online_limit)];
        let offline = recent_offline_list(log, rendered_at, self.offline_limit);

        let summaries = [
            (SummaryKind::Online, render_online(online, total_online, rendered_at)),
            (SummaryKind::Offline, render_offline(&offline, rendered_at)),
        ];
        for (kind, summary) in &summaries {
            if let Err(e) = self.sink.upsert(*kind, summary).await {
                warn!(kind = kind.as_str(), error = %e, "summary not published");
            }
        }
    }
}

/// Run `tick` every `period`, starting immediately. A failing tick is logged
/// and the loop carries on.
pub async fn run_periodic<F, Fut>(name: &'static str, period: Duration, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<TickReport>>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(cycle = name, period_secs = period.as_secs(), "cycle started");
    loop {
        ticker.tick().await;
        match tick().await {
            Ok(report) => info!(
                cycle = name,
                listed = report.listed,
                online = report.online,
                new_players = report.merge.new_players,
                opened = report.merge.opened,
                closed = report.merge.closed,
                "tick complete"
            ),
            Err(e) => error!(cycle = name, error = %e, "tick failed"),
        }
    }
}

/// Spawn the fast and slow cycles on the runtime.
pub fn spawn_cycles<A>(
    poller: Arc<Poller<A>>,
    fast_period: Duration,
    slow_period: Duration,
) -> (JoinHandle<()>, JoinHandle<()>)
where
    A: MessageApi + 'static,
{
    let fast_poller = Arc::clone(&poller);
    let fast = tokio::spawn(async move {
        run_periodic("player_list", fast_period, || {
            let poller = Arc::clone(&fast_poller);
            async move { poller.refresh_all().await }
        })
        .await;
    });
    let slow = tokio::spawn(async move {
        run_periodic("player_details", slow_period, || {
            let poller = Arc::clone(&poller);
            async move { poller.refresh_ledger().await }
        })
        .await;
    });
    (fast, slow)
}
