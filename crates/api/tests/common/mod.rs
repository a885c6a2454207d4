#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use rescue_api::auth::jwt::{generate_access_token, JwtConfig};
use rescue_api::config::ServerConfig;
use rescue_api::router::build_app_router;
use rescue_api::state::AppState;
use rescue_events::{
    MemoryBusHub, MessageBus, NotificationProducer, NotificationRelay, PgNotificationStore,
    PushConfig, PushConnectionRegistry,
};
use rescue_lock::{CriticalSectionGuard, DistributedLockManager, LockConfig, MemoryLockStore};
use sqlx::PgPool;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
///
/// Lock waits are short so contention tests finish quickly.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        redis_url: "redis://127.0.0.1:6379".to_string(),
        lock: LockConfig {
            wait: Duration::from_secs(1),
            lease: Duration::from_secs(10),
            retry_interval: Duration::from_millis(10),
        },
        push: PushConfig::default(),
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// Application state over `pool` with in-memory lock authority and bus.
///
/// The relay's bus pump is running, so notifications published through the
/// returned state reach push streams opened against it.
pub fn test_state(pool: PgPool) -> AppState {
    test_state_on(pool, &MemoryBusHub::new(), &MemoryLockStore::new())
}

/// Like [`test_state`], sharing `hub` and `lock_store` with other states to
/// simulate several server processes.
pub fn test_state_on(pool: PgPool, hub: &MemoryBusHub, lock_store: &MemoryLockStore) -> AppState {
    state_from(pool, hub, lock_store, test_config())
}

/// Application state with its own in-memory lock authority and bus, built
/// from `config`.
pub fn test_state_with(pool: PgPool, config: ServerConfig) -> AppState {
    state_from(pool, &MemoryBusHub::new(), &MemoryLockStore::new(), config)
}

fn state_from(
    pool: PgPool,
    hub: &MemoryBusHub,
    lock_store: &MemoryLockStore,
    config: ServerConfig,
) -> AppState {
    let bus = Arc::new(hub.connect());
    let relay = Arc::new(NotificationRelay::new(
        bus.clone(),
        Arc::new(PushConnectionRegistry::new()),
    ));
    tokio::spawn(Arc::clone(&relay).run(bus.messages()));

    let producer = NotificationProducer::new(
        Arc::new(PgNotificationStore::new(pool.clone())),
        Arc::clone(&relay),
    );
    let locks = CriticalSectionGuard::new(DistributedLockManager::new(
        Arc::new(lock_store.clone()),
        config.lock,
    ));

    AppState {
        pool,
        config: Arc::new(config),
        locks,
        relay,
        producer,
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_router(test_state(pool), &test_config())
}

/// Build the router over an existing state.
pub fn build_app(state: AppState) -> Router {
    let config = state.config.clone();
    build_app_router(state, &config)
}

/// A valid bearer token for `email`.
pub fn token_for(email: &str) -> String {
    generate_access_token(email, &test_config().jwt).expect("token generation should succeed")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn patch_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    send(app, Method::PATCH, uri, Some(token), Some(body)).await
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read the next chunk of a streaming body as text.
pub async fn next_chunk(body: &mut Body) -> String {
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("a frame should arrive")
        .expect("the stream should be open")
        .unwrap();
    let data = frame.into_data().expect("a data frame");
    String::from_utf8(data.to_vec()).unwrap()
}
