//! In-process stand-ins for the CurseForge and Discord HTTP APIs.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use modwatch::catalog::{CurseForgeClient, CurseForgeConfig};
use modwatch::notification::{DiscordConfig, DiscordDispatcher};

async fn spawn_server(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[derive(Debug, Clone)]
pub struct StubFile {
    pub id: u64,
    pub display_name: String,
    pub changelog: Option<String>,
}

#[derive(Default)]
struct CatalogState {
    mods: HashMap<u64, Vec<StubFile>>,
    /// 429 responses still to hand out before serving normally.
    throttle_remaining: u32,
    /// Throttle without a Retry-After header.
    throttle_without_hint: bool,
    requests: Vec<(String, Instant)>,
    api_keys: Vec<Option<String>>,
}

/// Fake CurseForge API under `/v1`.
#[derive(Clone, Default)]
pub struct CurseForgeStub {
    state: Arc<Mutex<CatalogState>>,
}

impl CurseForgeStub {
    pub fn add_mod(&self, mod_id: u64) {
        self.state.lock().unwrap().mods.entry(mod_id).or_default();
    }

    /// Publish a file; the newest file is listed first.
    pub fn publish(&self, mod_id: u64, file_id: u64, display_name: &str, changelog: Option<&str>) {
        self.state.lock().unwrap().mods.entry(mod_id).or_default().insert(
            0,
            StubFile {
                id: file_id,
                display_name: display_name.to_string(),
                changelog: changelog.map(str::to_string),
            },
        );
    }

    pub fn throttle_next(&self, count: u32) {
        self.state.lock().unwrap().throttle_remaining = count;
    }

    /// Like [`Self::throttle_next`], but the 429s carry no Retry-After.
    pub fn throttle_next_without_hint(&self, count: u32) {
        let mut state = self.state.lock().unwrap();
        state.throttle_remaining = count;
        state.throttle_without_hint = true;
    }

    pub fn request_paths(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn request_instants(&self) -> Vec<Instant> {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .map(|(_, t)| *t)
            .collect()
    }

    pub fn api_keys(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().api_keys.clone()
    }

    pub async fn start(&self) -> String {
        let app = Router::new()
            .route("/v1/mods/{mod_id}", get(mod_info))
            .route("/v1/mods/{mod_id}/files", get(mod_files))
            .route("/v1/mods/{mod_id}/files/{file_id}/changelog", get(changelog))
            .with_state(self.clone());
        let addr = spawn_server(app).await;
        format!("http://{}/v1", addr)
    }

    /// Record the request; `Some(response)` when it is throttled.
    fn intercept(&self, path: String, headers: &HeaderMap) -> Option<Response> {
        let mut state = self.state.lock().unwrap();
        state.requests.push((path, Instant::now()));
        state.api_keys.push(
            headers
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        );

        if state.throttle_remaining > 0 {
            state.throttle_remaining -= 1;
            if state.throttle_without_hint {
                return Some((StatusCode::TOO_MANY_REQUESTS, "slow down").into_response());
            }
            return Some(
                (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "0")], "slow down").into_response(),
            );
        }
        None
    }
}

async fn mod_info(
    State(stub): State<CurseForgeStub>,
    Path(mod_id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    if let Some(throttled) = stub.intercept(format!("/mods/{}", mod_id), &headers) {
        return throttled;
    }
    if !stub.state.lock().unwrap().mods.contains_key(&mod_id) {
        return StatusCode::NOT_FOUND.into_response();
    }

    axum::Json(json!({
        "data": {
            "id": mod_id,
            "gameId": 83374,
            "name": format!("Mod {}", mod_id),
            "slug": format!("mod-{}", mod_id),
            "logo": { "id": 1, "url": format!("https://media.example/{}.png", mod_id), "thumbnailUrl": null }
        }
    }))
    .into_response()
}

async fn mod_files(
    State(stub): State<CurseForgeStub>,
    Path(mod_id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    if let Some(throttled) = stub.intercept(format!("/mods/{}/files", mod_id), &headers) {
        return throttled;
    }
    let state = stub.state.lock().unwrap();
    let Some(files) = state.mods.get(&mod_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let data: Vec<Value> = files
        .iter()
        .map(|f| {
            json!({
                "id": f.id,
                "modId": mod_id,
                "displayName": f.display_name,
                "fileName": f.display_name.replace(' ', "_"),
            })
        })
        .collect();
    axum::Json(json!({ "data": data })).into_response()
}

async fn changelog(
    State(stub): State<CurseForgeStub>,
    Path((mod_id, file_id)): Path<(u64, u64)>,
    headers: HeaderMap,
) -> Response {
    if let Some(throttled) = stub.intercept(
        format!("/mods/{}/files/{}/changelog", mod_id, file_id),
        &headers,
    ) {
        return throttled;
    }
    let state = stub.state.lock().unwrap();
    let file = state
        .mods
        .get(&mod_id)
        .and_then(|files| files.iter().find(|f| f.id == file_id));
    match file {
        Some(file) => axum::Json(json!({ "data": file.changelog })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Debug, Clone)]
pub struct PostedMessage {
    pub channel_id: u64,
    pub body: Value,
}

#[derive(Default)]
struct DiscordState {
    messages: Vec<PostedMessage>,
    reactions: Vec<(u64, String)>,
    crossposts: Vec<u64>,
    fail_messages: bool,
    throttle_remaining: u32,
    /// `/users/@me` responses still to answer with an unparseable body.
    garbled_user_remaining: u32,
    user_probes: u32,
    auth_headers: Vec<Option<String>>,
}

/// Fake Discord REST API under `/api/v10`.
#[derive(Clone, Default)]
pub struct DiscordStub {
    state: Arc<Mutex<DiscordState>>,
}

impl DiscordStub {
    pub fn messages(&self) -> Vec<PostedMessage> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn reactions(&self) -> Vec<(u64, String)> {
        self.state.lock().unwrap().reactions.clone()
    }

    pub fn crossposts(&self) -> Vec<u64> {
        self.state.lock().unwrap().crossposts.clone()
    }

    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().auth_headers.clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.state.lock().unwrap().fail_messages = fail;
    }

    pub fn throttle_next(&self, count: u32) {
        self.state.lock().unwrap().throttle_remaining = count;
    }

    pub fn garble_user_responses(&self, count: u32) {
        self.state.lock().unwrap().garbled_user_remaining = count;
    }

    pub fn user_probes(&self) -> u32 {
        self.state.lock().unwrap().user_probes
    }

    pub async fn start(&self) -> String {
        let app = Router::new()
            .route("/api/v10/users/@me", get(current_user))
            .route("/api/v10/channels/{channel_id}/messages", post(create_message))
            .route(
                "/api/v10/channels/{channel_id}/messages/{message_id}/reactions/{emoji}/@me",
                put(add_reaction),
            )
            .route(
                "/api/v10/channels/{channel_id}/messages/{message_id}/crosspost",
                post(crosspost),
            )
            .with_state(self.clone());
        let addr = spawn_server(app).await;
        format!("http://{}/api/v10", addr)
    }
}

async fn current_user(State(stub): State<DiscordStub>) -> Response {
    let mut state = stub.state.lock().unwrap();
    state.user_probes += 1;
    if state.garbled_user_remaining > 0 {
        state.garbled_user_remaining -= 1;
        return (StatusCode::OK, "<html>gateway</html>").into_response();
    }
    axum::Json(json!({ "id": "1", "username": "modwatch-bot" })).into_response()
}

async fn create_message(
    State(stub): State<DiscordStub>,
    Path(channel_id): Path<u64>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> Response {
    let mut state = stub.state.lock().unwrap();
    state.auth_headers.push(
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );

    if state.throttle_remaining > 0 {
        state.throttle_remaining -= 1;
        return (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "0")], "{}").into_response();
    }
    if state.fail_messages {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }

    state.messages.push(PostedMessage { channel_id, body });
    let id = 900 + state.messages.len() as u64;
    axum::Json(json!({ "id": id.to_string(), "channel_id": channel_id.to_string() })).into_response()
}

async fn add_reaction(
    State(stub): State<DiscordStub>,
    Path((channel_id, _message_id, emoji)): Path<(u64, String, String)>,
) -> StatusCode {
    stub.state.lock().unwrap().reactions.push((channel_id, emoji));
    StatusCode::NO_CONTENT
}

async fn crosspost(
    State(stub): State<DiscordStub>,
    Path((channel_id, _message_id)): Path<(u64, String)>,
) -> axum::Json<Value> {
    stub.state.lock().unwrap().crossposts.push(channel_id);
    axum::Json(json!({}))
}

pub fn catalog_client(base_url: &str, request_delay: Duration) -> CurseForgeClient {
    CurseForgeClient::new(CurseForgeConfig {
        base_url: base_url.to_string(),
        api_key: "test-key".to_string(),
        request_delay,
        default_retry_after: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
        ..CurseForgeConfig::default()
    })
    .unwrap()
}

pub fn discord_config(api_base: &str) -> DiscordConfig {
    DiscordConfig {
        api_base: api_base.to_string(),
        bot_token: "test-token".to_string(),
        website_url: "https://www.curseforge.com/ark-survival-ascended/mods".to_string(),
        ready_retry_delay: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
        ..DiscordConfig::default()
    }
}

pub fn discord_dispatcher(api_base: &str) -> DiscordDispatcher {
    DiscordDispatcher::new(discord_config(api_base)).unwrap()
}
