//! Redis-backed lock authority.
//!
//! A lock is a plain key set with `SET name token NX PX lease`. Release runs
//! a compare-and-delete script so a holder whose lease already expired can
//! never free a lock that was re-acquired by someone else.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::error::LockStoreError;
use crate::store::LockStore;

/// Deletes `KEYS[1]` only if it still holds `ARGV[1]`.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// [`LockStore`] talking to a shared Redis (or Redis-compatible) server.
#[derive(Clone)]
pub struct RedisLockStore {
    conn: ConnectionManager,
    release_script: redis::Script,
}

impl RedisLockStore {
    /// Open a managed, auto-reconnecting connection to `redis_url`.
    pub async fn connect(redis_url: &str) -> Result<Self, LockStoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::new(conn))
    }

    /// Wrap an existing connection manager (shared with other Redis users in
    /// the process).
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            release_script: redis::Script::new(RELEASE_SCRIPT),
        }
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn try_acquire(
        &self,
        name: &str,
        token: &str,
        lease: Duration,
    ) -> Result<bool, LockStoreError> {
        let mut conn = self.conn.clone();
        let lease_ms = u64::try_from(lease.as_millis()).unwrap_or(u64::MAX).max(1);

        let reply: Option<String> = redis::cmd("SET")
            .arg(name)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(lease_ms)
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }

    async fn release(&self, name: &str, token: &str) -> Result<bool, LockStoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = self
            .release_script
            .key(name)
            .arg(token)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }
}
