//! Cross-process mutual exclusion for Fridge Rescue.
//!
//! - [`LockStore`] -- thin client to the shared lock authority
//!   ([`RedisLockStore`] in production, [`MemoryLockStore`] for tests and
//!   single-node development).
//! - [`DistributedLockManager`] -- acquire with a bounded wait, release
//!   without ever failing; leases auto-expire so a crashed holder cannot
//!   deadlock the resource.
//! - [`CriticalSectionGuard`] -- runs an operation under a lock named
//!   `"{prefix}:{key}"` and releases it on every exit path.

pub mod config;
pub mod error;
pub mod guard;
pub mod manager;
pub mod redis_store;
pub mod store;

pub use config::LockConfig;
pub use error::{LockError, LockStoreError};
pub use guard::CriticalSectionGuard;
pub use manager::{DistributedLockManager, LockHandle};
pub use redis_store::RedisLockStore;
pub use store::{LockStore, MemoryLockStore};
