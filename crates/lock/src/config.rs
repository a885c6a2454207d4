use std::time::Duration;

/// Default maximum time to wait for a lock.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Default lease after which the authority frees a lock on its own.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(10);

/// Default pause between acquisition attempts while waiting.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Timing bounds for lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    /// Maximum time `acquire` may block before failing with
    /// [`LockError::AcquisitionDenied`](crate::LockError::AcquisitionDenied).
    pub wait: Duration,
    /// Lease granted on acquisition.
    pub lease: Duration,
    /// Polling interval while the lock is held by someone else.
    pub retry_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            wait: DEFAULT_WAIT,
            lease: DEFAULT_LEASE,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}
