//! In-process stand-in for the spreadsheet directory script.
//!
//! Serves `GET` and `POST` on `/exec` with the same JSON envelopes as the
//! real endpoint, keeps members in memory, and exposes knobs for injecting
//! delays and inspecting what the client sent.

#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    routing::get,
    Json, Router,
};
use chrono::{Days, NaiveDate};
use libgym::{DirectoryClient, DirectoryConfig};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::oneshot;

pub const PASSWORD: &str = "letmein";

#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub content_type: Option<String>,
    pub body: Value,
}

#[derive(Debug, Default)]
struct MockState {
    members: RwLock<BTreeMap<String, Value>>,
    requests: AtomicUsize,
    delay_ms: AtomicU64,
    last_post: RwLock<Option<RecordedPost>>,
    renew_end_override: RwLock<Option<String>>,
}

pub struct MockDirectory {
    state: Arc<MockState>,
    endpoint: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockDirectory {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());

        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = tokio::net::TcpListener::bind(addr).await.expect("bind mock directory");
        let local_addr = listener.local_addr().expect("mock directory address");
        let endpoint = format!("http://{local_addr}/exec");

        let app = Router::new()
            .route("/exec", get(handle_get).post(handle_post))
            .with_state(state.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;

            if let Err(e) = result {
                eprintln!("mock directory error: {e}");
            }
        });

        Self {
            state,
            endpoint,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn client(&self) -> DirectoryClient {
        self.client_with(DirectoryConfig::new())
    }

    pub fn client_with(&self, config: DirectoryConfig) -> DirectoryClient {
        let config = config.with_endpoint(&self.endpoint).unwrap();
        DirectoryClient::new(config).unwrap()
    }

    /// Stores a raw record, including the stale status fields the real
    /// sheet keeps alongside each row.
    pub fn insert(&self, record: Value) {
        let id = record["id"].as_str().unwrap().to_string();
        self.state.members.write().insert(id, stale(record));
    }

    pub fn record(&self, id: &str) -> Option<Value> {
        self.state.members.read().get(id).cloned()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn last_post(&self) -> Option<RecordedPost> {
        self.state.last_post.read().clone()
    }

    pub fn report_renew_end_date(&self, end_date: &str) {
        *self.state.renew_end_override.write() = Some(end_date.to_string());
    }
}

impl Drop for MockDirectory {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn stale(mut record: Value) -> Value {
    record["status"] = json!("Active");
    record["daysRemaining"] = json!(999);
    record
}

fn ok(extra: Value) -> Json<Value> {
    let mut body = json!({ "success": true });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        body.extend(extra.clone());
    }
    Json(body)
}

fn fail(error: &str) -> Json<Value> {
    Json(json!({ "success": false, "error": error }))
}

fn plan_days(plan: &str) -> Option<u64> {
    match plan {
        "3 Months" => Some(90),
        "6 Months" => Some(180),
        "1 Year" => Some(365),
        _ => None,
    }
}

async fn pause(state: &MockState) {
    state.requests.fetch_add(1, Ordering::SeqCst);

    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

async fn handle_get(
    State(state): State<Arc<MockState>>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Json<Value> {
    pause(&state).await;

    match params.get("action").map(String::as_str) {
        Some("lookup") => {
            let id = params.get("id").cloned().unwrap_or_default();
            match state.members.read().get(&id) {
                Some(member) => ok(json!({ "member": member })),
                None => fail("Member not found"),
            }
        }
        Some("getAll") => {
            if params.get("password").map(String::as_str) != Some(PASSWORD) {
                return fail("Invalid password");
            }
            let members: Vec<Value> = state.members.read().values().cloned().collect();
            ok(json!({ "members": members }))
        }
        _ => fail("Unknown action"),
    }
}

async fn handle_post(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: String,
) -> Json<Value> {
    pause(&state).await;

    let Ok(request) = serde_json::from_str::<Value>(&body) else {
        return fail("Malformed request");
    };

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *state.last_post.write() = Some(RecordedPost {
        content_type,
        body: request.clone(),
    });

    if request["password"].as_str() != Some(PASSWORD) {
        return fail("Unauthorized: invalid password");
    }

    let mut members = state.members.write();

    match request["action"].as_str() {
        Some("addMember") => {
            let member = request["member"].clone();
            let id = member["id"].as_str().unwrap_or_default().to_string();
            if members.contains_key(&id) {
                return fail("Member ID already exists");
            }
            members.insert(id, stale(member));
            ok(json!({ "message": "Member added" }))
        }
        Some("updateMember") => {
            let member = request["member"].clone();
            let id = member["id"].as_str().unwrap_or_default().to_string();
            match members.get_mut(&id) {
                Some(existing) => {
                    if let (Some(existing), Some(changes)) =
                        (existing.as_object_mut(), member.as_object())
                    {
                        existing.extend(changes.clone());
                    }
                    ok(json!({}))
                }
                None => fail("Member not found"),
            }
        }
        Some("renewMember") => {
            let id = request["memberId"].as_str().unwrap_or_default();
            let plan = request["membershipType"].as_str().unwrap_or_default();
            let start = request["startDate"].as_str().unwrap_or_default();

            let Some(existing) = members.get_mut(id) else {
                return fail("Member not found");
            };
            let parsed = NaiveDate::parse_from_str(start, "%Y-%m-%d");
            let (Some(days), Ok(start_date)) = (plan_days(plan), parsed) else {
                return fail("Invalid renewal");
            };
            let end_date = (start_date + Days::new(days)).format("%Y-%m-%d").to_string();

            existing["membershipType"] = json!(plan);
            existing["startDate"] = json!(start);
            existing["endDate"] = json!(end_date);

            let reported = state.renew_end_override.read().clone().unwrap_or(end_date);
            ok(json!({ "newEndDate": reported }))
        }
        Some("deleteMember") => {
            let id = request["memberId"].as_str().unwrap_or_default();
            match members.remove(id) {
                Some(_) => ok(json!({})),
                None => fail("Member not found"),
            }
        }
        _ => fail("Unknown action"),
    }
}
