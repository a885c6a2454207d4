use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rescue_events::{
    MessageBus, NotificationProducer, NotificationRelay, PgNotificationStore,
    PushConnectionRegistry, RedisMessageBus,
};
use rescue_lock::{CriticalSectionGuard, DistributedLockManager, RedisLockStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rescue_api::config::ServerConfig;
use rescue_api::router::build_app_router;
use rescue_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rescue_api=debug,rescue_events=debug,rescue_lock=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = rescue_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    rescue_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    rescue_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Distributed locks ---
    let lock_store = RedisLockStore::connect(&config.redis_url)
        .await
        .expect("Failed to connect to the lock authority");
    let locks = CriticalSectionGuard::new(DistributedLockManager::new(
        Arc::new(lock_store),
        config.lock,
    ));
    tracing::info!(
        wait_ms = config.lock.wait.as_millis(),
        lease_ms = config.lock.lease.as_millis(),
        "Lock manager ready"
    );

    // --- Message bus ---
    let bus_cancel = CancellationToken::new();
    let (bus, pump_handle) = RedisMessageBus::connect(&config.redis_url, bus_cancel.clone())
        .await
        .expect("Failed to connect to the message bus");
    let bus = Arc::new(bus);
    tracing::info!("Message bus connected");

    // --- Notification pipeline ---
    let relay = Arc::new(NotificationRelay::new(
        bus.clone(),
        Arc::new(PushConnectionRegistry::new()),
    ));
    let relay_handle = tokio::spawn(Arc::clone(&relay).run(bus.messages()));

    let producer = NotificationProducer::new(
        Arc::new(PgNotificationStore::new(pool.clone())),
        Arc::clone(&relay),
    );
    tracing::info!("Notification relay started");

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        locks,
        relay: Arc::clone(&relay),
        producer,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Open push streams never finish on their own, so they are closed as
    // soon as shutdown starts.
    let shutdown_relay = Arc::clone(&relay);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let closed = shutdown_relay.registry().close_all().await;
            tracing::info!(closed, "Closed push connections");
        })
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    bus_cancel.cancel();
    if tokio::time::timeout(grace, pump_handle).await.is_err() {
        tracing::warn!("Message bus pump did not stop in time");
    }
    tracing::info!("Message bus pump stopped");

    relay_handle.abort();
    tracing::info!(
        remaining = relay.registry().connection_count().await,
        "Notification relay stopped"
    );

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
