//! Real-time notification pipeline.
//!
//! - [`NotificationProducer`] deduplicates and persists notifications, then
//!   hands them to the relay.
//! - [`NotificationRelay`] publishes on the shared [`MessageBus`] and, on
//!   receipt, writes to the recipient's live connection if this process
//!   holds it.
//! - [`PushConnectionRegistry`] maps recipients to live connections.
//! - [`PushSession`] owns one connection's lifecycle, from handshake to its
//!   single cleanup.

pub mod bus;
pub mod error;
pub mod producer;
pub mod redis_bus;
pub mod registry;
pub mod relay;
pub mod session;
pub mod store;

pub use bus::{BusMessage, MemoryBusHub, MemoryMessageBus, MessageBus};
pub use error::{BusError, ProducerError, PushError, StoreError};
pub use producer::{NotificationProducer, PublishOutcome};
pub use redis_bus::RedisMessageBus;
pub use registry::{PushConnection, PushConnectionRegistry};
pub use relay::NotificationRelay;
pub use session::{CloseReason, PushConfig, PushFrame, PushSession};
pub use store::{MemoryNotificationStore, NotificationStore, PgNotificationStore};
