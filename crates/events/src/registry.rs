//! Process-local registry of live push connections.

use std::collections::HashMap;

use rescue_core::types::Timestamp;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::PushError;
use crate::session::PushFrame;

// ---------------------------------------------------------------------------
// PushConnection
// ---------------------------------------------------------------------------

/// Handle to one live push stream.
///
/// Writes never block: frames go into a bounded buffer drained by the
/// session that owns the stream. Cloning shares the same stream.
#[derive(Clone)]
pub struct PushConnection {
    id: Uuid,
    recipient: String,
    sender: mpsc::Sender<PushFrame>,
    closed: CancellationToken,
    connected_at: Timestamp,
}

impl PushConnection {
    /// Create a connection and the receiver its session drains.
    pub fn new(recipient: impl Into<String>, buffer: usize) -> (Self, mpsc::Receiver<PushFrame>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let conn = Self {
            id: Uuid::new_v4(),
            recipient: recipient.into(),
            sender,
            closed: CancellationToken::new(),
            connected_at: chrono::Utc::now(),
        };
        (conn, receiver)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn connected_at(&self) -> Timestamp {
        self.connected_at
    }

    /// Queue a frame without waiting.
    pub fn try_push(&self, frame: PushFrame) -> Result<(), PushError> {
        if self.closed.is_cancelled() {
            return Err(PushError::Closed);
        }
        self.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PushError::Full,
            mpsc::error::TrySendError::Closed(_) => PushError::Closed,
        })
    }

    /// Ask the owning session to shut the stream down.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.sender.is_closed()
    }

    pub(crate) fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }
}

impl std::fmt::Debug for PushConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushConnection")
            .field("id", &self.id)
            .field("recipient", &self.recipient)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PushConnectionRegistry
// ---------------------------------------------------------------------------

/// Maps a recipient to its live push connection on this process.
///
/// Each operation is atomic; entries are independent so no cross-entry
/// locking is needed. Designed to be wrapped in `Arc` and shared.
#[derive(Default)]
pub struct PushConnectionRegistry {
    connections: RwLock<HashMap<String, PushConnection>>,
}

impl PushConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `conn` for its recipient, returning the connection it
    /// replaced, if any.
    pub async fn add(&self, conn: PushConnection) -> Option<PushConnection> {
        let recipient = conn.recipient.clone();
        let replaced = self.connections.write().await.insert(recipient, conn);
        if let Some(old) = &replaced {
            tracing::debug!(recipient = %old.recipient, conn_id = %old.id, "Replaced push connection");
        }
        replaced
    }

    pub async fn find(&self, recipient: &str) -> Option<PushConnection> {
        self.connections.read().await.get(recipient).cloned()
    }

    /// Remove whatever connection is registered for `recipient`. Removing an
    /// absent entry is a no-op.
    pub async fn remove(&self, recipient: &str) -> Option<PushConnection> {
        self.connections.write().await.remove(recipient)
    }

    /// Remove the entry only if it is still the connection `id`, so a stale
    /// teardown cannot evict a newer connection for the same recipient.
    pub async fn remove_connection(&self, recipient: &str, id: Uuid) -> bool {
        let mut conns = self.connections.write().await;
        match conns.get(recipient) {
            Some(conn) if conn.id == id => {
                conns.remove(recipient);
                true
            }
            _ => false,
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Signal every registered connection to close.
    ///
    /// Entries are left in place; each session removes its own entry as
    /// part of its cleanup.
    pub async fn close_all(&self) -> usize {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            conn.close();
        }
        tracing::info!(count = conns.len(), "Closing all push connections");
        conns.len()
    }
}
