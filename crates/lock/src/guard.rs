//! Declarative critical sections.
//!
//! [`CriticalSectionGuard::guard`] acquires `"{prefix}:{key}"`, runs the
//! operation, and releases the lock exactly once on every exit path:
//! success, error, panic, and cancellation of the calling future.

use std::fmt::Display;
use std::future::Future;

use crate::error::LockError;
use crate::manager::{DistributedLockManager, LockHandle};

/// Runs operations under a named distributed lock.
#[derive(Clone)]
pub struct CriticalSectionGuard {
    locks: DistributedLockManager,
}

impl CriticalSectionGuard {
    pub fn new(locks: DistributedLockManager) -> Self {
        Self { locks }
    }

    pub fn locks(&self) -> &DistributedLockManager {
        &self.locks
    }

    /// Run `op` while holding `"{prefix}:{key}"`.
    ///
    /// If the lock cannot be acquired, `op` never runs and the
    /// [`LockError`] is returned through `E`. Otherwise `op`'s own result is
    /// returned unchanged.
    pub async fn guard<K, F, Fut, T, E>(&self, prefix: &str, key: K, op: F) -> Result<T, E>
    where
        K: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let handle = self.locks.acquire(prefix, &key.to_string()).await?;
        let held = HeldLock::new(&self.locks, handle);

        let result = op().await;

        held.release().await;
        result
    }

    /// Like [`guard`](Self::guard), deriving the key from the operation's
    /// input.
    pub async fn guard_with<I, K, KF, F, Fut, T, E>(
        &self,
        prefix: &str,
        input: I,
        key_of: KF,
        op: F,
    ) -> Result<T, E>
    where
        K: Display,
        KF: FnOnce(&I) -> K,
        F: FnOnce(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let key = key_of(&input);
        self.guard(prefix, key, move || op(input)).await
    }
}

/// A held lock that hands itself back to the manager when dropped.
struct HeldLock<'a> {
    locks: &'a DistributedLockManager,
    handle: Option<LockHandle>,
}

impl<'a> HeldLock<'a> {
    fn new(locks: &'a DistributedLockManager, handle: LockHandle) -> Self {
        Self {
            locks,
            handle: Some(handle),
        }
    }

    async fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            self.locks.release(handle).await;
        }
    }
}

impl Drop for HeldLock<'_> {
    fn drop(&mut self) {
        // Only reached on unwind or cancellation.
        if let Some(handle) = self.handle.take() {
            tracing::debug!(lock = %handle.name(), "Releasing lock on abnormal exit");
            self.locks.release_detached(handle);
        }
    }
}
