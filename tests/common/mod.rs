#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use showtransmission::transmission::{RpcResponse, RpcTransport};
use showtransmission::{FeedItem, FeedSource, Result, ShowTransmissionError};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use url::Url;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// One request as the daemon saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub session_id: String,
    pub body: Value,
}

impl RecordedRequest {
    pub fn method(&self) -> &str {
        self.body["method"].as_str().unwrap_or_default()
    }
}

pub fn response(status: u16, session_id: Option<&str>, body: Value) -> RpcResponse {
    RpcResponse {
        status,
        session_id: session_id.map(|s| s.to_string()),
        body: body.to_string(),
    }
}

pub fn session_conflict(token: &str) -> RpcResponse {
    response(409, Some(token), json!({}))
}

/// Replays canned responses in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<RpcResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<RpcResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn send(&self, _url: &Url, session_id: &str, body: &str) -> Result<RpcResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            session_id: session_id.to_string(),
            body: serde_json::from_str(body)?,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ShowTransmissionError::HttpStatus {
                status: 599,
                url: "script exhausted".to_string(),
            })
    }
}

/// Behaves like a small Transmission daemon: insists on its session token,
/// answers `session-get` and remembers added torrents.
pub struct FakeDaemon {
    pub token: String,
    pub rpc_version_minimum: i64,
    pub download_dir: String,
    /// Links the daemon refuses with a non-duplicate error.
    pub failing_links: HashSet<String>,
    added: Mutex<HashSet<String>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl FakeDaemon {
    pub fn new() -> Self {
        Self {
            token: "daemon-token".to_string(),
            rpc_version_minimum: 1,
            download_dir: "/downloads".to_string(),
            failing_links: HashSet::new(),
            added: Mutex::new(HashSet::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_existing(self, link: &str) -> Self {
        self.added.lock().unwrap().insert(link.to_string());
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Accepted `torrent-add` requests, in order.
    pub fn torrent_adds(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method() == "torrent-add" && r.session_id == self.token)
            .collect()
    }
}

#[async_trait]
impl RpcTransport for FakeDaemon {
    async fn send(&self, _url: &Url, session_id: &str, body: &str) -> Result<RpcResponse> {
        let body: Value = serde_json::from_str(body)?;
        self.requests.lock().unwrap().push(RecordedRequest {
            session_id: session_id.to_string(),
            body: body.clone(),
        });

        if session_id != self.token {
            return Ok(session_conflict(&self.token));
        }

        let reply = match body["method"].as_str() {
            Some("session-get") => json!({
                "result": "success",
                "arguments": {
                    "download-dir": self.download_dir,
                    "rpc-version": 17,
                    "rpc-version-minimum": self.rpc_version_minimum,
                    "version": "4.0.5",
                }
            }),
            Some("torrent-add") => {
                let link = body["arguments"]["filename"].as_str().unwrap_or_default().to_string();
                if self.failing_links.contains(&link) {
                    json!({"result": "invalid or corrupt torrent file", "arguments": {}})
                } else if !self.added.lock().unwrap().insert(link) {
                    json!({"result": "duplicate torrent", "arguments": {}})
                } else {
                    json!({
                        "result": "success",
                        "arguments": {"torrent-added": {"id": 1, "name": "episode", "hashString": "abc"}}
                    })
                }
            }
            _ => json!({"result": "method name not recognized", "arguments": {}}),
        };

        Ok(response(200, None, reply))
    }
}

/// Serves a fixed item list and counts how often it was asked.
pub struct StaticFeed {
    pub items: Vec<FeedItem>,
    fetches: AtomicUsize,
}

impl StaticFeed {
    pub fn new(items: Vec<FeedItem>) -> Self {
        Self {
            items,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    fn location(&self) -> &str {
        "static://feed"
    }

    async fn fetch_items(&self) -> Result<Vec<FeedItem>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.clone())
    }
}

pub fn episode(info_hash: &str, show_name: &str) -> FeedItem {
    FeedItem {
        info_hash: info_hash.to_string(),
        title: format!("{} 1x01", show_name),
        link: format!("magnet:?xt=urn:btih:{}", info_hash),
        show_name: show_name.to_string(),
        show_id: Some("42".to_string()),
        episode: Some("1001".to_string()),
        published: chrono::DateTime::parse_from_rfc2822("Mon, 19 Oct 2026 10:00:00 +0000")
            .unwrap()
            .with_timezone(&chrono::Utc),
    }
}
