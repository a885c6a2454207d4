//! Acquire/release with a bounded wait and an auto-expiring lease.

use std::sync::Arc;
use std::time::Duration;

use rescue_core::naming::{lock_name, validate_lock_prefix};
use tokio::time::Instant;

use crate::config::LockConfig;
use crate::error::{LockError, LockStoreError};
use crate::store::LockStore;

// ---------------------------------------------------------------------------
// LockHandle
// ---------------------------------------------------------------------------

/// Proof of a successful acquisition.
///
/// Consumed by [`DistributedLockManager::release`], so a handle can be
/// released at most once. The ownership token stays private.
#[derive(Debug)]
pub struct LockHandle {
    name: String,
    token: String,
    acquired_at: Instant,
    lease: Duration,
}

impl LockHandle {
    /// Full lock name, `"{prefix}:{key}"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// Whether the authority has (by its own clock) already freed the lock.
    pub fn is_expired(&self) -> bool {
        self.acquired_at.elapsed() >= self.lease
    }
}

// ---------------------------------------------------------------------------
// DistributedLockManager
// ---------------------------------------------------------------------------

/// Lock API shared by every request handler in the process.
///
/// Cheap to clone; clones share the same [`LockStore`].
#[derive(Clone)]
pub struct DistributedLockManager {
    store: Arc<dyn LockStore>,
    config: LockConfig,
}

impl DistributedLockManager {
    pub fn new(store: Arc<dyn LockStore>, config: LockConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Acquire `"{prefix}:{key}"`, waiting at most `config.wait`.
    ///
    /// Fails with [`LockError::AcquisitionDenied`] when the wait bound
    /// elapses and [`LockError::ServiceUnavailable`] on any store error. On
    /// failure nothing is held.
    pub async fn acquire(&self, prefix: &str, key: &str) -> Result<LockHandle, LockError> {
        validate_lock_prefix(prefix).map_err(|e| LockError::InvalidName(e.to_string()))?;

        let name = lock_name(prefix, key);
        let token = uuid::Uuid::new_v4().to_string();
        let deadline = Instant::now() + self.config.wait;

        tracing::debug!(lock = %name, "Attempting lock acquisition");

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            // A hung authority must not stretch the wait bound; give the
            // attempt itself at least one retry interval.
            let attempt_budget = remaining.max(self.config.retry_interval);

            let attempt = tokio::time::timeout(
                attempt_budget,
                self.store.try_acquire(&name, &token, self.config.lease),
            )
            .await;

            match attempt {
                Ok(Ok(true)) => {
                    tracing::debug!(lock = %name, "Lock acquired");
                    return Ok(LockHandle {
                        name,
                        token,
                        acquired_at: Instant::now(),
                        lease: self.config.lease,
                    });
                }
                Ok(Ok(false)) => {}
                Ok(Err(source)) => {
                    tracing::error!(lock = %name, error = %source, "Lock store failed");
                    return Err(LockError::ServiceUnavailable { name, source });
                }
                Err(_) => {
                    tracing::error!(lock = %name, "Lock store timed out");
                    // The SET may still have landed; free it under our token.
                    self.spawn_release(name.clone(), token);
                    return Err(LockError::ServiceUnavailable {
                        name,
                        source: LockStoreError::Timeout(attempt_budget),
                    });
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(lock = %name, wait = ?self.config.wait, "Lock acquisition denied");
                return Err(LockError::AcquisitionDenied { name });
            }
            tokio::time::sleep(self.config.retry_interval.min(remaining)).await;
        }
    }

    /// Release a lock. Never fails.
    ///
    /// A lease that already expired, or a store error, is logged and
    /// otherwise ignored; the authority frees the name when the lease runs
    /// out in any case.
    pub async fn release(&self, handle: LockHandle) {
        match self.store.release(&handle.name, &handle.token).await {
            Ok(true) => tracing::debug!(lock = %handle.name, "Lock released"),
            Ok(false) => tracing::warn!(
                lock = %handle.name,
                held_for = ?handle.acquired_at.elapsed(),
                "Lock was no longer held at release (lease expired)"
            ),
            Err(e) => tracing::error!(
                lock = %handle.name,
                error = %e,
                "Lock release failed, lease will expire on its own"
            ),
        }
    }

    /// Release from a context that cannot await (drop paths).
    pub(crate) fn release_detached(&self, handle: LockHandle) {
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                let manager = self.clone();
                rt.spawn(async move { manager.release(handle).await });
            }
            Err(_) => tracing::error!(
                lock = %handle.name,
                "No runtime to release lock, lease will expire on its own"
            ),
        }
    }

    fn spawn_release(&self, name: String, token: String) {
        let handle = LockHandle {
            name,
            token,
            acquired_at: Instant::now(),
            lease: self.config.lease,
        };
        self.release_detached(handle);
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::store::MemoryLockStore;

    fn manager(store: &MemoryLockStore) -> DistributedLockManager {
        DistributedLockManager::new(Arc::new(store.clone()), LockConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_and_release_frees_the_name() {
        let store = MemoryLockStore::new();
        let locks = manager(&store);

        let handle = locks.acquire("bookmark_recipe", "42").await.unwrap();
        assert_eq!(handle.name(), "bookmark_recipe:42");
        assert!(store.is_held("bookmark_recipe:42"));

        locks.release(handle).await;
        assert!(!store.is_held("bookmark_recipe:42"));
    }

    #[tokio::test(start_paused = true)]
    async fn contended_acquire_is_denied_after_wait_bound() {
        let store = MemoryLockStore::new();
        let process_a = manager(&store);
        let process_b = manager(&store);

        let _held = process_a.acquire("report_recipe", "7").await.unwrap();

        let started = Instant::now();
        let err = process_b.acquire("report_recipe", "7").await.unwrap_err();

        assert_matches!(err, LockError::AcquisitionDenied { ref name } if name == "report_recipe:7");
        assert!(started.elapsed() >= LockConfig::default().wait);
        assert!(started.elapsed() < LockConfig::default().wait + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_acquires_once_holder_releases_within_bound() {
        let store = MemoryLockStore::new();
        let process_a = manager(&store);
        let process_b = manager(&store);

        let held = process_a.acquire("review_recipe", "1").await.unwrap();

        let waiter = tokio::spawn(async move { process_b.acquire("review_recipe", "1").await });

        tokio::time::sleep(Duration::from_secs(2)).await;
        process_a.release(held).await;

        let handle = waiter.await.unwrap().expect("waiter must acquire after release");
        assert_eq!(handle.name(), "review_recipe:1");
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_keys_never_contend() {
        let store = MemoryLockStore::new();
        let locks = manager(&store);

        let started = Instant::now();
        let a = locks.acquire("bookmark_recipe", "1").await.unwrap();
        let b = locks.acquire("bookmark_recipe", "2").await.unwrap();

        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(store.held_count(), 2);
        locks.release(a).await;
        locks.release(b).await;
    }

    #[tokio::test(start_paused = true)]
    async fn crashed_holder_is_freed_by_lease() {
        let store = MemoryLockStore::new();
        let locks = manager(&store);

        // Simulate a holder that never releases.
        let abandoned = locks.acquire("get_recipe", "3").await.unwrap();
        std::mem::forget(abandoned);

        tokio::time::advance(LockConfig::default().lease).await;
        let handle = locks.acquire("get_recipe", "3").await.unwrap();
        assert_eq!(handle.name(), "get_recipe:3");
    }

    #[tokio::test(start_paused = true)]
    async fn store_failure_is_service_unavailable() {
        let store = MemoryLockStore::new();
        store.set_unavailable(true);
        let locks = manager(&store);

        let err = locks.acquire("bookmark_recipe", "1").await.unwrap_err();
        assert_matches!(err, LockError::ServiceUnavailable { .. });
        assert!(err.is_retriable());
    }

    #[tokio::test(start_paused = true)]
    async fn release_after_expiry_does_not_raise() {
        let store = MemoryLockStore::new();
        let locks = manager(&store);

        let handle = locks.acquire("bookmark_recipe", "1").await.unwrap();
        tokio::time::advance(LockConfig::default().lease * 2).await;
        assert!(handle.is_expired());

        locks.release(handle).await;

        store.set_unavailable(true);
        let handle = LockHandle {
            name: "bookmark_recipe:9".into(),
            token: "t".into(),
            acquired_at: Instant::now(),
            lease: Duration::from_secs(1),
        };
        locks.release(handle).await;
    }

    #[tokio::test]
    async fn empty_prefix_is_rejected() {
        let locks = manager(&MemoryLockStore::new());
        let err = locks.acquire("", "1").await.unwrap_err();
        assert_matches!(err, LockError::InvalidName(_));
    }
}
