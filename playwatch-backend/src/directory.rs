//! Client for the paginated player directory.

use std::sync::Arc;

use playwatch_db::PollEntry;
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cache::DetailCache;
use crate::config::{Config, ConfigError};
use crate::error::FetchError;
use crate::fetcher::RateLimitedFetcher;
use crate::helpers::now;

#[derive(Debug, Deserialize)]
struct PlayerPage {
    #[serde(default)]
    data: Vec<PlayerResource>,
}

#[derive(Debug, Deserialize)]
struct PlayerResource {
    id: String,
    #[serde(default)]
    attributes: PlayerAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct PlayerAttributes {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayerDetail {
    #[serde(default)]
    included: Vec<Included>,
}

#[derive(Debug, Deserialize)]
struct Included {
    #[serde(rename = "type")]
    kind: String,
    id: String,
    #[serde(default)]
    meta: ServerMeta,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMeta {
    #[serde(default)]
    online: bool,
    /// Seconds played on this server.
    #[serde(default)]
    time_played: i64,
}

pub struct DirectoryClient {
    fetcher: Arc<RateLimitedFetcher>,
    cache: DetailCache,
    base_url: Url,
    headers: HeaderMap,
    page_size: usize,
    max_pages: usize,
}

impl DirectoryClient {
    pub fn new(fetcher: Arc<RateLimitedFetcher>, config: &Config) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.directory_url).map_err(|_| ConfigError::Invalid {
            key: "BM_API_URL",
            value: config.directory_url.clone(),
        })?;
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.directory_token))
            .map_err(|_| ConfigError::Invalid {
                key: "BM_API_TOKEN",
                value: "<redacted>".to_string(),
            })?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        Ok(Self {
            fetcher,
            cache: DetailCache::new(config.cache_ttl),
            base_url,
            headers,
            page_size: config.page_size.max(1),
            max_pages: config.max_pages.max(1),
        })
    }

    pub fn cache(&self) -> &DetailCache {
        &self.cache
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path().trim_end_matches('/').to_string();
            segments.push_str(path);
            url.set_path(&segments);
        }
        url.query_pairs_mut().extend_pairs(query);
        url
    }

    async fn fetch(&self, url: &Url) -> Result<Value, FetchError> {
        self.fetcher.fetch(url.as_str(), &self.headers).await
    }

    /// All players the directory reports online on `server_id`, as `(id, name)`.
    ///
    /// Stops at the first short page, after `max_pages` pages, or at the first
    /// failed page; in the last case the players collected so far are returned.
    pub async fn list_online_players(&self, server_id: &str) -> Vec<(String, String)> {
        let mut players = Vec::new();
        let page_size = self.page_size.to_string();

        for page in 0..self.max_pages {
            let offset = (page * self.page_size).to_string();
            let url = self.endpoint(
                "/players",
                &[
                    ("filter[servers]", server_id),
                    ("filter[online]", "true"),
                    ("page[offset]", offset.as_str()),
                    ("page[size]", page_size.as_str()),
                ],
            );

            let body = match self.fetch(&url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(%server_id, page, error = %e, "player list page failed, stopping");
                    break;
                }
            };
            let page_data: PlayerPage = match serde_json::from_value(body) {
                Ok(page_data) => page_data,
                Err(e) => {
                    warn!(%server_id, page, error = %e, "malformed player list page, stopping");
                    break;
                }
            };

            let count = page_data.data.len();
            players.extend(page_data.data.into_iter().map(|p| {
                let name = p.attributes.name.unwrap_or_else(|| "N/A".to_string());
                (p.id, name)
            }));

            if count < self.page_size {
                break;
            }
            if page + 1 == self.max_pages {
                debug!(%server_id, pages = self.max_pages, "pagination cap reached");
            }
        }

        debug!(%server_id, players = players.len(), "listed online players");
        players
    }

    /// Server-scoped session detail for one player.
    ///
    /// Returns `None` when the fetch fails or the player is not online on
    /// `server_id`. Fresh cache entries are returned without a request.
    pub async fn get_player_detail(
        &self,
        player_id: &str,
        name: &str,
        server_id: &str,
    ) -> Option<PollEntry> {
        if let Some(cached) = self.cache.get(player_id).await {
            debug!(%player_id, "detail cache hit");
            return Some(cached);
        }

        let url = self.endpoint(
            &format!("/players/{}", player_id),
            &[("include", "server"), ("filter[servers]", server_id)],
        );
        let body = match self.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(%player_id, error = %e, "player detail fetch failed");
                return None;
            }
        };
        let detail: PlayerDetail = match serde_json::from_value(body) {
            Ok(detail) => detail,
            Err(e) => {
                warn!(%player_id, error = %e, "malformed player detail");
                return None;
            }
        };

        let meta = detail
            .included
            .into_iter()
            .find(|inc| inc.kind == "server" && inc.id == server_id)
            .map(|inc| inc.meta)?;
        if !meta.online {
            debug!(%player_id, %server_id, "player not online on server");
            return None;
        }

        let entry = PollEntry {
            player_id: player_id.to_string(),
            name: name.to_string(),
            playtime_minutes: meta.time_played.max(0) / 60,
            timestamp: now(),
        };
        self.cache.insert(entry.clone()).await;
        Some(entry)
    }

    /// Fetch details for every listed player concurrently and wait for all of
    /// them. Players whose detail is unavailable are left out.
    pub async fn fetch_snapshot(
        self: &Arc<Self>,
        players: Vec<(String, String)>,
        server_id: &str,
    ) -> Vec<PollEntry> {
        let mut tasks = JoinSet::new();
        for (index, (player_id, name)) in players.into_iter().enumerate() {
            let client = Arc::clone(self);
            let server_id = server_id.to_string();
            tasks.spawn(async move {
                let detail = client
                    .get_player_detail(&player_id, &name, &server_id)
                    .await;
                (index, detail)
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!(error = %e, "detail task failed"),
            }
        }
        // Keep listing order regardless of completion order
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().filter_map(|(_, detail)| detail).collect()
    }
}
