//! The lock authority seam and its in-memory implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::LockStoreError;

/// Client to the mutual-exclusion authority shared by every process.
///
/// Implementations must make `try_acquire` atomic across processes: at most
/// one caller may hold a given `name` until it is released or its lease
/// runs out.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Make a single, non-blocking attempt to take `name` for `lease`.
    ///
    /// Returns `Ok(true)` if the lock is now held under `token`, `Ok(false)`
    /// if someone else holds it.
    async fn try_acquire(
        &self,
        name: &str,
        token: &str,
        lease: Duration,
    ) -> Result<bool, LockStoreError>;

    /// Free `name` if it is still held under `token`.
    ///
    /// Returns `Ok(false)` when the lease already expired or the lock now
    /// belongs to another holder; that is not an error.
    async fn release(&self, name: &str, token: &str) -> Result<bool, LockStoreError>;
}

// ---------------------------------------------------------------------------
// MemoryLockStore
// ---------------------------------------------------------------------------

struct Lease {
    token: String,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    leases: Mutex<HashMap<String, Lease>>,
    unavailable: AtomicBool,
}

/// Process-local [`LockStore`].
///
/// Clones share the same table, so several [`DistributedLockManager`]s built
/// from clones behave like separate server processes talking to one
/// authority. Leases expire on the tokio clock, which lets tests drive
/// expiry with `tokio::time::pause`.
///
/// [`DistributedLockManager`]: crate::DistributedLockManager
#[derive(Clone, Default)]
pub struct MemoryLockStore {
    inner: Arc<Inner>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the authority were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Whether `name` is currently held by anyone.
    pub fn is_held(&self, name: &str) -> bool {
        let now = Instant::now();
        self.lock_table()
            .get(name)
            .is_some_and(|lease| lease.expires_at > now)
    }

    /// Number of unexpired leases.
    pub fn held_count(&self) -> usize {
        let now = Instant::now();
        self.lock_table()
            .values()
            .filter(|lease| lease.expires_at > now)
            .count()
    }

    fn check_available(&self) -> Result<(), LockStoreError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(LockStoreError::Unavailable(
                "memory lock store switched off".to_string(),
            ));
        }
        Ok(())
    }

    fn lock_table(&self) -> std::sync::MutexGuard<'_, HashMap<String, Lease>> {
        // A poisoned table only means a panicking test thread held it; the
        // map itself is still consistent.
        self.inner
            .leases
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn try_acquire(
        &self,
        name: &str,
        token: &str,
        lease: Duration,
    ) -> Result<bool, LockStoreError> {
        self.check_available()?;
        let now = Instant::now();
        let mut table = self.lock_table();

        if let Some(current) = table.get(name) {
            if current.expires_at > now {
                return Ok(false);
            }
        }

        table.insert(
            name.to_string(),
            Lease {
                token: token.to_string(),
                expires_at: now + lease,
            },
        );
        Ok(true)
    }

    async fn release(&self, name: &str, token: &str) -> Result<bool, LockStoreError> {
        self.check_available()?;
        let now = Instant::now();
        let mut table = self.lock_table();

        match table.get(name) {
            Some(current) if current.token == token => {
                let live = current.expires_at > now;
                table.remove(name);
                Ok(live)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEASE: Duration = Duration::from_secs(10);

    #[tokio::test(start_paused = true)]
    async fn second_holder_is_refused_until_release() {
        let store = MemoryLockStore::new();

        assert!(store.try_acquire("a:1", "t1", LEASE).await.unwrap());
        assert!(!store.try_acquire("a:1", "t2", LEASE).await.unwrap());

        assert!(store.release("a:1", "t1").await.unwrap());
        assert!(store.try_acquire("a:1", "t2", LEASE).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn lease_expires_without_release() {
        let store = MemoryLockStore::new();
        assert!(store.try_acquire("a:1", "t1", LEASE).await.unwrap());

        tokio::time::advance(LEASE + Duration::from_millis(1)).await;

        assert!(!store.is_held("a:1"));
        assert!(store.try_acquire("a:1", "t2", LEASE).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_token_cannot_free_new_holder() {
        let store = MemoryLockStore::new();
        store.try_acquire("a:1", "old", LEASE).await.unwrap();
        tokio::time::advance(LEASE * 2).await;
        store.try_acquire("a:1", "new", LEASE).await.unwrap();

        assert!(!store.release("a:1", "old").await.unwrap());
        assert!(store.is_held("a:1"));
    }

    #[tokio::test]
    async fn releasing_unknown_name_is_not_an_error() {
        let store = MemoryLockStore::new();
        assert!(!store.release("never:held", "t").await.unwrap());
    }

    #[tokio::test]
    async fn clones_share_one_table() {
        let process_a = MemoryLockStore::new();
        let process_b = process_a.clone();

        assert!(process_a.try_acquire("a:1", "t1", LEASE).await.unwrap());
        assert!(!process_b.try_acquire("a:1", "t2", LEASE).await.unwrap());
        assert_eq!(process_b.held_count(), 1);
    }

    #[tokio::test]
    async fn switched_off_store_reports_unavailable() {
        let store = MemoryLockStore::new();
        store.set_unavailable(true);

        let err = store.try_acquire("a:1", "t1", LEASE).await.unwrap_err();
        assert!(matches!(err, LockStoreError::Unavailable(_)));
    }
}
