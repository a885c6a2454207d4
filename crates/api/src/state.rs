use std::sync::Arc;

use rescue_events::{NotificationProducer, NotificationRelay};
use rescue_lock::CriticalSectionGuard;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: rescue_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Runs recipe counter updates under their distributed lock.
    pub locks: CriticalSectionGuard,
    /// Bus bridge and the process-local push connections.
    pub relay: Arc<NotificationRelay>,
    /// Entry point for business logic that emits notifications.
    pub producer: NotificationProducer,
}
