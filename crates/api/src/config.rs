use std::time::Duration;

use rescue_events::PushConfig;
use rescue_lock::LockConfig;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for background tasks to stop after the listener closes.
    pub shutdown_timeout_secs: u64,
    /// Lock authority and message bus (default: `redis://127.0.0.1:6379`).
    pub redis_url: String,
    /// Distributed lock timing.
    pub lock: LockConfig,
    /// Push connection limits.
    pub push: PushConfig,
    /// JWT token configuration.
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                   |
    /// |--------------------------|---------------------------|
    /// | `HOST`                   | `0.0.0.0`                 |
    /// | `PORT`                   | `3000`                    |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`   |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                      |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                      |
    /// | `REDIS_URL`              | `redis://127.0.0.1:6379`  |
    /// | `LOCK_WAIT_MS`           | `5000`                    |
    /// | `LOCK_LEASE_MS`          | `10000`                   |
    /// | `LOCK_RETRY_INTERVAL_MS` | `50`                      |
    /// | `PUSH_IDLE_TIMEOUT_SECS` | `3600`                    |
    /// | `PUSH_BUFFER`            | `64`                      |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = env_parse("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_parse("REQUEST_TIMEOUT_SECS", 30);
        let shutdown_timeout_secs: u64 = env_parse("SHUTDOWN_TIMEOUT_SECS", 30);

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());

        let lock_defaults = LockConfig::default();
        let lock = LockConfig {
            wait: Duration::from_millis(env_parse(
                "LOCK_WAIT_MS",
                duration_ms(lock_defaults.wait),
            )),
            lease: Duration::from_millis(env_parse(
                "LOCK_LEASE_MS",
                duration_ms(lock_defaults.lease),
            )),
            retry_interval: Duration::from_millis(env_parse(
                "LOCK_RETRY_INTERVAL_MS",
                duration_ms(lock_defaults.retry_interval),
            )),
        };

        let push_defaults = PushConfig::default();
        let push = PushConfig {
            idle_timeout: Duration::from_secs(env_parse(
                "PUSH_IDLE_TIMEOUT_SECS",
                push_defaults.idle_timeout.as_secs(),
            )),
            buffer: env_parse("PUSH_BUFFER", push_defaults.buffer),
        };

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            redis_url,
            lock,
            push,
            jwt,
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset.
///
/// # Panics
///
/// Panics if the variable is set but does not parse.
fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be valid: {e}")),
        Err(_) => default,
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
