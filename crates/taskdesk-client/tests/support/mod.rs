//! In-process stand-in for the taskdesk backend.
//!
//! Access tokens are valid until `expire_access` swaps the server-side token;
//! the refresh token is valid until `revoke_refresh`.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "admin123";

#[derive(Default)]
pub struct MockBackend {
    access_token: Mutex<String>,
    refresh_token: Mutex<Option<String>>,
    issued: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub task_requests: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub reject_all_tasks: AtomicBool,
    pub fail_logout: AtomicBool,
    /// Answer refresh calls with 503 without looking at the token.
    pub fail_refresh: AtomicBool,
    pub login_saw_authorization: AtomicBool,
    pub duplicate_authorization: AtomicBool,
    pub refresh_delay: Duration,
    tasks: Mutex<Vec<Value>>,
    messages: Mutex<Vec<Value>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            refresh_delay: Duration::from_millis(50),
            ..Self::default()
        })
    }

    fn issue_access(&self) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("access-{n}");
        *self.access_token.lock() = token.clone();
        token
    }

    /// Invalidate the access token held by clients.
    pub fn expire_access(&self) {
        *self.access_token.lock() = "server-side-only".to_string();
    }

    /// Invalidate the refresh token held by clients.
    pub fn revoke_refresh(&self) {
        *self.refresh_token.lock() = None;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn task_requests(&self) -> usize {
        self.task_requests.load(Ordering::SeqCst)
    }

    fn check_access(&self, headers: &HeaderMap) -> Result<(), Response> {
        if headers.get_all(AUTHORIZATION).iter().count() > 1 {
            self.duplicate_authorization.store(true, Ordering::SeqCst);
            return Err((StatusCode::BAD_REQUEST, "duplicate authorization").into_response());
        }
        if self.reject_all_tasks.load(Ordering::SeqCst) {
            return Err(unauthorized("Token expired"));
        }
        match bearer(headers) {
            Some(token) if token == *self.access_token.lock() => Ok(()),
            _ => Err(unauthorized("Token expired")),
        }
    }
}

/// Bind on an ephemeral port and return the API base URL.
pub async fn spawn(backend: Arc<MockBackend>) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(backend);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/api")).unwrap()
}

fn router(backend: Arc<MockBackend>) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}/status", patch(update_status))
        .route("/api/chat/{task_id}/messages", get(list_messages).post(send_message))
        .route("/api/telegram/status", get(telegram_status))
        .route("/api/slow", get(slow))
        .with_state(backend)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": message }))).into_response()
}

fn admin_profile() -> Value {
    json!({
        "id": 1,
        "username": USERNAME,
        "name": "Administrator",
        "role": "admin",
        "performance": { "tasksCompleted": 3, "tasksInProgress": 1, "completionRate": 0.75 }
    })
}

async fn login(
    State(backend): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if headers.contains_key(AUTHORIZATION) {
        backend.login_saw_authorization.store(true, Ordering::SeqCst);
    }
    if body["username"] != USERNAME || body["password"] != PASSWORD {
        return unauthorized("Invalid username or password");
    }

    let access = backend.issue_access();
    let refresh = format!("refresh-{}", backend.issued.load(Ordering::SeqCst));
    *backend.refresh_token.lock() = Some(refresh.clone());

    Json(json!({
        "accessToken": access,
        "refreshToken": refresh,
        "user": admin_profile(),
    }))
    .into_response()
}

async fn refresh(State(backend): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(backend.refresh_delay).await;

    if backend.fail_refresh.load(Ordering::SeqCst) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "message": "Refresh temporarily unavailable" })),
        )
            .into_response();
    }

    let valid = backend.refresh_token.lock().clone();
    match (bearer(&headers), valid) {
        (Some(presented), Some(valid)) if presented == valid => {
            let access = backend.issue_access();
            Json(json!({ "accessToken": access })).into_response()
        }
        _ => unauthorized("Invalid refresh token"),
    }
}

async fn logout(State(backend): State<Arc<MockBackend>>) -> StatusCode {
    backend.logout_calls.fetch_add(1, Ordering::SeqCst);
    if backend.fail_logout.load(Ordering::SeqCst) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn me(State(backend): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    if let Err(response) = backend.check_access(&headers) {
        return response;
    }
    let mut profile = admin_profile();
    profile["name"] = json!("Admin (server)");
    Json(profile).into_response()
}

async fn list_tasks(State(backend): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    backend.task_requests.fetch_add(1, Ordering::SeqCst);
    if let Err(response) = backend.check_access(&headers) {
        return response;
    }
    Json(json!({ "tasks": backend.tasks.lock().clone() })).into_response()
}

async fn create_task(
    State(backend): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = backend.check_access(&headers) {
        return response;
    }
    let mut tasks = backend.tasks.lock();
    let task = json!({
        "id": tasks.len() + 1,
        "title": body["title"],
        "description": body.get("description").cloned().unwrap_or(Value::Null),
        "status": "pending",
        "priority": body["priority"],
        "createdBy": 1,
    });
    tasks.push(task.clone());
    (StatusCode::CREATED, Json(task)).into_response()
}

async fn update_status(
    State(backend): State<Arc<MockBackend>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = backend.check_access(&headers) {
        return response;
    }
    let mut tasks = backend.tasks.lock();
    match tasks.iter_mut().find(|t| t["id"].to_string() == id) {
        Some(task) => {
            task["status"] = body["status"].clone();
            Json(task.clone()).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "Task not found" }))).into_response(),
    }
}

async fn list_messages(
    State(backend): State<Arc<MockBackend>>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = backend.check_access(&headers) {
        return response;
    }
    let messages: Vec<Value> = backend
        .messages
        .lock()
        .iter()
        .filter(|m| m["taskId"] == task_id.as_str())
        .cloned()
        .collect();
    Json(messages).into_response()
}

async fn send_message(
    State(backend): State<Arc<MockBackend>>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = backend.check_access(&headers) {
        return response;
    }
    let mut messages = backend.messages.lock();
    let message = json!({
        "id": messages.len() + 1,
        "taskId": task_id,
        "senderId": 1,
        "senderName": "Administrator",
        "content": body["content"],
        "createdAt": "2026-10-16T09:30:00Z",
    });
    messages.push(message.clone());
    (StatusCode::CREATED, Json(message)).into_response()
}

async fn telegram_status(State(backend): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    if let Err(response) = backend.check_access(&headers) {
        return response;
    }
    Json(json!({ "linked": true, "chatId": 123456789, "username": "admin_bot_user" })).into_response()
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "too late"
}
