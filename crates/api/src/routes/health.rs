use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database is unreachable.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub db_healthy: bool,
    pub push: PushHealth,
}

/// Push fan-out held by this process.
#[derive(Serialize)]
pub struct PushHealth {
    /// Open push connections.
    pub connections: usize,
    /// Recipient channels the relay is subscribed to on the bus. Equal to
    /// `connections` unless cleanup is in flight.
    pub subscriptions: usize,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = rescue_db::health_check(&state.pool).await.is_ok();
    let push = PushHealth {
        connections: state.relay.registry().connection_count().await,
        subscriptions: state.relay.subscription_count().await,
    };

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        push,
    })
}

/// Mounted at the root, outside `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
