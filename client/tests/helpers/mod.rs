//! Reusable helpers for client integration tests.
//!
//! [`spawn_backend`] serves a small in-memory stand-in for the `NewsSphere`
//! REST backend on `127.0.0.1:0`; [`start_client`] wires a [`NewsSphere`]
//! against it with a mock identity provider.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use ns_client::config::TokenStoreKind;
use ns_client::identity::MockIdentityProvider;
use ns_client::session::SessionSnapshot;
use ns_client::{ClientConfig, NewsSphere};
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const PASSWORD: &str = "Secret1";

// ============================================================================
// Stub backend
// ============================================================================

/// Backend state and knobs shared with the test body.
#[derive(Default)]
pub struct Backend {
    /// Emails holding the administrator role.
    pub admins: Mutex<HashSet<String>>,
    /// Remaining subscription days per email.
    pub subscriptions: Mutex<HashMap<String, i64>>,
    /// Answer every authenticated call with 401.
    pub reject_tokens: AtomicBool,
    /// Answer `POST /jwt` with 500.
    pub fail_token_exchange: AtomicBool,
    /// Answer `GET /user-status` with 500.
    pub fail_status: AtomicBool,
    /// Delay before answering the role probe.
    pub role_delay_ms: AtomicU64,
    /// Delay before answering `POST /jwt`.
    pub jwt_delay_ms: AtomicU64,
    pub jwt_calls: AtomicUsize,
    pub role_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl Backend {
    pub fn grant_admin(&self, email: &str) {
        self.admins.lock().unwrap().insert(email.to_string());
    }

    pub fn subscribe(&self, email: &str, days: i64) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(email.to_string(), days);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

type Shared = Arc<Backend>;
type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn failure(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "message": message })))
}

/// Tokens look like `tok-<email>`.
fn authorize(backend: &Backend, headers: &HeaderMap) -> Result<String, (StatusCode, Json<Value>)> {
    let unauthorized = || failure(StatusCode::UNAUTHORIZED, "unauthorized access");
    if backend.reject_tokens.load(Ordering::SeqCst) {
        return Err(unauthorized());
    }
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer tok-"))
        .map(str::to_string)
        .ok_or_else(unauthorized)
}

pub fn article_json(id: &str, status: &str, premium: bool) -> Value {
    json!({
        "_id": id,
        "title": format!("Headline {id}"),
        "image": format!("https://img.example/{id}.png"),
        "publisher": "Daily Planet",
        "tags": ["world"],
        "description": "Body text",
        "status": status,
        "isPremium": premium,
        "views": 3,
        "authorName": "Ada",
        "authorEmail": "ada@example.com",
        "authorPhoto": null,
        "postedDate": "2024-05-01T10:00:00Z"
    })
}

async fn issue_token(State(backend): State<Shared>, Json(body): Json<Value>) -> Reply {
    backend.jwt_calls.fetch_add(1, Ordering::SeqCst);
    let delay = backend.jwt_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if backend.fail_token_exchange.load(Ordering::SeqCst) {
        return Err(failure(StatusCode::INTERNAL_SERVER_ERROR, "token store down"));
    }
    let email = body["email"].as_str().unwrap_or_default();
    Ok(Json(json!({ "token": format!("tok-{email}") })))
}

async fn check_admin(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Path(email): Path<String>,
) -> Reply {
    authorize(&backend, &headers)?;
    backend.role_calls.fetch_add(1, Ordering::SeqCst);
    let delay = backend.role_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let admin = backend.admins.lock().unwrap().contains(&email);
    Ok(Json(json!({ "admin": admin })))
}

async fn user_status(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    authorize(&backend, &headers)?;
    backend.status_calls.fetch_add(1, Ordering::SeqCst);
    // Long enough for concurrent lookups to overlap
    tokio::time::sleep(Duration::from_millis(50)).await;
    if backend.fail_status.load(Ordering::SeqCst) {
        return Err(failure(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable"));
    }
    let email = query.get("email").cloned().unwrap_or_default();
    let days = backend.subscriptions.lock().unwrap().get(&email).copied();
    Ok(Json(match days {
        Some(days) => json!({ "message": "Subscription active", "remainingDays": days }),
        None => json!({ "message": "No subscription" }),
    }))
}

async fn list_articles(State(backend): State<Shared>, headers: HeaderMap) -> Reply {
    authorize(&backend, &headers)?;
    Ok(Json(json!({
        "articles": [article_json("a1", "approved", false)],
        "totalArticles": 1
    })))
}

async fn list_news(Query(query): Query<HashMap<String, String>>) -> Reply {
    let articles = [
        article_json("rust", "approved", false),
        article_json("go", "approved", true),
    ];
    let search = query.get("search").cloned().unwrap_or_default();
    let matching: Vec<Value> = articles
        .into_iter()
        .filter(|a| a["title"].as_str().unwrap_or_default().contains(&search))
        .collect();
    Ok(Json(Value::Array(matching)))
}

async fn premium_articles(State(backend): State<Shared>, headers: HeaderMap) -> Reply {
    authorize(&backend, &headers)?;
    // Missing fields and a number where a string belongs
    Ok(Json(json!([{ "_id": "p1", "title": 42 }])))
}

async fn delete_article(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    authorize(&backend, &headers)?;
    if id.starts_with("approved") {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            "Approved articles cannot be deleted",
        ));
    }
    Ok(Json(json!({ "acknowledged": true, "deletedCount": 1 })))
}

async fn create_payment_intent(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    authorize(&backend, &headers)?;
    let price = body["price"].as_u64().unwrap_or_default();
    Ok(Json(json!({ "clientSecret": format!("pi_secret_{price}") })))
}

async fn update_subscription(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    authorize(&backend, &headers)?;
    let email = body["email"].as_str().unwrap_or_default();
    let minutes = body["durationMinutes"].as_i64().unwrap_or_default();
    backend.subscribe(email, (minutes / (60 * 24)).max(1));
    Ok(Json(json!({
        "acknowledged": true,
        "matchedCount": 1,
        "modifiedCount": 1
    })))
}

pub fn router(backend: Shared) -> Router {
    Router::new()
        .route("/jwt", post(issue_token))
        .route("/users/admin/{email}", get(check_admin))
        .route("/user-status", get(user_status))
        .route("/articles", get(list_articles))
        .route("/articles/{id}", delete(delete_article))
        .route("/news", get(list_news))
        .route("/premium-articles", get(premium_articles))
        .route("/create-payment-intent", post(create_payment_intent))
        .route("/update-subscription", patch(update_subscription))
        .with_state(backend)
}

// ============================================================================
// Test servers
// ============================================================================

/// A running stub backend.
pub struct TestServer {
    pub addr: SocketAddr,
    pub url: String,
    pub backend: Shared,
    _handle: JoinHandle<()>,
}

pub async fn spawn_backend() -> TestServer {
    let backend = Arc::new(Backend::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local addr");
    let url = format!("http://{addr}");

    let app = router(Arc::clone(&backend));
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });

    TestServer {
        addr,
        url,
        backend,
        _handle: handle,
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct TestClient {
    pub app: NewsSphere,
    pub provider: Arc<MockIdentityProvider>,
    pub server: TestServer,
}

impl TestClient {
    pub fn backend(&self) -> &Backend {
        &self.server.backend
    }
}

/// Start a client against a fresh backend.
pub async fn start_client(provider: MockIdentityProvider, token_store: TokenStoreKind) -> TestClient {
    start_client_with(provider, |config| config.token_store = token_store).await
}

/// Start a client against a fresh backend, adjusting the test configuration.
pub async fn start_client_with(
    provider: MockIdentityProvider,
    configure: impl FnOnce(&mut ClientConfig),
) -> TestClient {
    ns_client::telemetry::init_tracing();
    let server = spawn_backend().await;
    let mut config = ClientConfig::default_for_test(server.url.as_str());
    configure(&mut config);

    let provider = Arc::new(provider);
    let app = NewsSphere::with_provider(config, reqwest::Client::new(), provider.clone())
        .expect("Failed to start client");

    TestClient {
        app,
        provider,
        server,
    }
}

/// Sign `email` in with the mock provider and wait for the backend session.
pub async fn sign_in(client: &TestClient, email: &str) {
    client.provider.add_account(email, PASSWORD, Some("Tester"));
    client
        .app
        .session
        .sign_in(email, PASSWORD)
        .await
        .expect("sign-in failed");
    wait_for_snapshot(&client.app.session.subscribe(), SessionSnapshot::is_authenticated).await;
}

/// Wait up to two seconds for a snapshot matching `predicate`.
pub async fn wait_for_snapshot(
    rx: &watch::Receiver<SessionSnapshot>,
    predicate: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut rx = rx.clone();
    within(async move {
        rx.wait_for(|s| predicate(s))
            .await
            .map(|s| s.clone())
            .expect("session service stopped")
    })
    .await
}

/// Fail the test if `future` takes longer than two seconds.
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), future)
        .await
        .expect("timed out")
}
