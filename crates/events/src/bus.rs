//! Publish/subscribe transport shared by every server process.
//!
//! [`MessageBus`] is the seam: [`RedisMessageBus`](crate::RedisMessageBus)
//! in production, [`MemoryMessageBus`] (attached to a [`MemoryBusHub`]) for
//! tests and single-node development. Inbound messages on subscribed
//! channels are fanned out locally through a `tokio::sync::broadcast`
//! channel, one per bus instance.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::BusError;

/// Default buffer capacity for the inbound broadcast channel.
pub const DEFAULT_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// BusMessage
// ---------------------------------------------------------------------------

/// A message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub channel: String,
    pub payload: String,
}

// ---------------------------------------------------------------------------
// MessageBus
// ---------------------------------------------------------------------------

/// Client to the external publish/subscribe transport.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish `payload` on `channel`. Every process subscribed to the
    /// channel receives it; with no subscribers it is dropped.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError>;

    /// Start receiving messages published on `channel`.
    async fn subscribe(&self, channel: &str) -> Result<(), BusError>;

    /// Stop receiving messages published on `channel`.
    async fn unsubscribe(&self, channel: &str) -> Result<(), BusError>;

    /// Receive every message arriving on this instance's subscriptions.
    fn messages(&self) -> broadcast::Receiver<BusMessage>;
}

// ---------------------------------------------------------------------------
// MemoryBusHub / MemoryMessageBus
// ---------------------------------------------------------------------------

struct Node {
    sender: broadcast::Sender<BusMessage>,
    channels: Mutex<HashSet<String>>,
}

impl Node {
    fn channels(&self) -> MutexGuard<'_, HashSet<String>> {
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// In-process stand-in for the shared bus server.
///
/// Every [`MemoryMessageBus`] obtained from [`connect`](Self::connect) acts
/// as a separate server process attached to the same transport.
#[derive(Clone, Default)]
pub struct MemoryBusHub {
    nodes: Arc<Mutex<Vec<Weak<Node>>>>,
}

impl MemoryBusHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new bus client to this hub.
    pub fn connect(&self) -> MemoryMessageBus {
        let (sender, _) = broadcast::channel(DEFAULT_CAPACITY);
        let node = Arc::new(Node {
            sender,
            channels: Mutex::new(HashSet::new()),
        });
        self.lock_nodes().push(Arc::downgrade(&node));
        MemoryMessageBus { node, hub: self.clone() }
    }

    /// Total subscriptions across every attached client.
    pub fn subscription_count(&self) -> usize {
        self.live_nodes().iter().map(|n| n.channels().len()).sum()
    }

    fn live_nodes(&self) -> Vec<Arc<Node>> {
        let mut nodes = self.lock_nodes();
        nodes.retain(|n| n.strong_count() > 0);
        nodes.iter().filter_map(Weak::upgrade).collect()
    }

    fn lock_nodes(&self) -> MutexGuard<'_, Vec<Weak<Node>>> {
        self.nodes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One process's client to a [`MemoryBusHub`].
pub struct MemoryMessageBus {
    node: Arc<Node>,
    hub: MemoryBusHub,
}

impl MemoryMessageBus {
    /// Channels this client is currently subscribed to.
    pub fn subscription_count(&self) -> usize {
        self.node.channels().len()
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.node.channels().contains(channel)
    }
}

#[async_trait]
impl MessageBus for MemoryMessageBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        for node in self.hub.live_nodes() {
            if node.channels().contains(channel) {
                // Ignore the SendError; it only means nobody is listening.
                let _ = node.sender.send(BusMessage {
                    channel: channel.to_string(),
                    payload: payload.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<(), BusError> {
        self.node.channels().insert(channel.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BusError> {
        self.node.channels().remove(channel);
        Ok(())
    }

    fn messages(&self) -> broadcast::Receiver<BusMessage> {
        self.node.sender.subscribe()
    }
}
