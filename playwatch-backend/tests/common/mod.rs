//! Local stand-in for the player directory API, served by axum on 127.0.0.1.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use playwatch_backend::SinkError;
use playwatch_backend::config::Config;
use playwatch_backend::sink::MessageApi;
use playwatch_backend::summary::RenderedSummary;
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const TOKEN: &str = "test-token";
pub const SERVER_ID: &str = "42";

#[derive(Default)]
pub struct MockState {
    /// Players the listing reports online, as `(id, name)`.
    pub online: Mutex<Vec<(String, String)>>,
    /// Seconds played per player id; players missing here are offline on the server.
    pub time_played: Mutex<HashMap<String, i64>>,
    /// Player ids whose detail body is not JSON.
    pub malformed: Mutex<Vec<String>>,
    /// Listing offset that answers 500.
    pub fail_offset: Mutex<Option<usize>>,
    /// Number of upcoming requests answered with 429.
    pub throttle_next: AtomicUsize,
    /// `Retry-After` value sent with 429s.
    pub retry_after: Mutex<Option<&'static str>>,
    /// Artificial latency per detail request.
    pub detail_delay: Mutex<Duration>,
    pub list_requests: AtomicUsize,
    pub detail_requests: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockState {
    pub fn set_online(&self, players: &[(&str, &str, i64)]) {
        *self.online.lock().unwrap() = players
            .iter()
            .map(|(id, name, _)| (id.to_string(), name.to_string()))
            .collect();
        let mut played = self.time_played.lock().unwrap();
        for (id, _, seconds) in players {
            played.insert(id.to_string(), *seconds);
        }
    }

    fn throttled(&self) -> Option<Response> {
        let remaining = self.throttle_next.load(Ordering::SeqCst);
        if remaining == 0 {
            return None;
        }
        self.throttle_next.store(remaining - 1, Ordering::SeqCst);
        let mut response = (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response();
        if let Some(value) = *self.retry_after.lock().unwrap() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, value.parse().unwrap());
        }
        Some(response)
    }
}

pub struct MockDirectory {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockDirectory {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/players", get(list_players))
            .route("/players/{id}", get(player_detail))
            .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "no such thing") }))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Test configuration pointed at this server with fast backoff.
    pub fn config(&self) -> Config {
        Config {
            directory_token: TOKEN.to_string(),
            discord_token: "discord".to_string(),
            channel_id: 7,
            server_id: SERVER_ID.to_string(),
            directory_url: format!("http://{}", self.addr),
            backoff_base: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
            request_timeout: Duration::from_secs(5),
            ..Config::default()
        }
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

async fn list_players(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.list_requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Some(response) = state.throttled() {
        return response;
    }
    if query.get("filter[servers]").map(String::as_str) != Some(SERVER_ID)
        || query.get("filter[online]").map(String::as_str) != Some("true")
    {
        return (StatusCode::BAD_REQUEST, "bad filter").into_response();
    }

    let offset: usize = query
        .get("page[offset]")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let size: usize = query
        .get("page[size]")
        .and_then(|v| v.parse().ok())
        .unwrap_or(100);
    if *state.fail_offset.lock().unwrap() == Some(offset) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }

    let data: Vec<Value> = state
        .online
        .lock()
        .unwrap()
        .iter()
        .skip(offset)
        .take(size)
        .map(|(id, name)| json!({"type": "player", "id": id, "attributes": {"name": name}}))
        .collect();
    Json(json!({ "data": data })).into_response()
}

async fn player_detail(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.detail_requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_in_flight.fetch_max(now, Ordering::SeqCst);
    let delay = *state.detail_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let response = detail_response(&state, &id, &query);
    state.in_flight.fetch_sub(1, Ordering::SeqCst);
    response
}

fn detail_response(state: &MockState, id: &str, query: &HashMap<String, String>) -> Response {
    if let Some(response) = state.throttled() {
        return response;
    }
    if query.get("include").map(String::as_str) != Some("server") {
        return (StatusCode::BAD_REQUEST, "missing include").into_response();
    }
    if state.malformed.lock().unwrap().iter().any(|m| m == id) {
        return (StatusCode::OK, "<html>not json</html>").into_response();
    }

    let played = state.time_played.lock().unwrap().get(id).copied();
    let online = state
        .online
        .lock()
        .unwrap()
        .iter()
        .any(|(player_id, _)| player_id == id);
    let mut included = vec![json!({
        "type": "server",
        "id": "999",
        "meta": {"online": false, "timePlayed": 1}
    })];
    if let Some(seconds) = played {
        included.push(json!({
            "type": "server",
            "id": SERVER_ID,
            "meta": {"online": online, "timePlayed": seconds}
        }));
    }
    Json(json!({
        "data": {"type": "player", "id": id},
        "included": included
    }))
    .into_response()
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Edit(u64, RenderedSummary),
    Create(RenderedSummary),
}

/// Chat sink that records calls and hands out increasing message ids.
#[derive(Default)]
pub struct RecordingApi {
    pub calls: Mutex<Vec<SinkCall>>,
    next_id: AtomicUsize,
    /// Message ids that answer "not found" on edit.
    pub missing: Mutex<Vec<u64>>,
}

impl RecordingApi {
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl MessageApi for RecordingApi {
    async fn edit_message(
        &self,
        _channel_id: u64,
        message_id: u64,
        summary: &RenderedSummary,
    ) -> Result<(), SinkError> {
        self.calls
            .lock()
            .unwrap()
            .push(SinkCall::Edit(message_id, summary.clone()));
        if self.missing.lock().unwrap().contains(&message_id) {
            return Err(SinkError::NotFound);
        }
        Ok(())
    }

    async fn create_message(
        &self,
        _channel_id: u64,
        summary: &RenderedSummary,
    ) -> Result<u64, SinkError> {
        self.calls
            .lock()
            .unwrap()
            .push(SinkCall::Create(summary.clone()));
        Ok(1000 + self.next_id.fetch_add(1, Ordering::SeqCst) as u64)
    }
}
