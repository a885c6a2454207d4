//! Lifecycle of a single push connection.
//!
//! `Unopened -> Open -> Closed`. [`PushSession::open`] registers the
//! connection, subscribes the relay and queues the handshake. The session is
//! then drained frame by frame; explicit close, idle timeout, eviction after
//! a failed write, and the client going away (the session being dropped) all
//! end in the same cleanup, which runs exactly once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::BusError;
use crate::registry::PushConnection;
use crate::relay::NotificationRelay;

/// Default inactivity bound before a connection is closed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Default per-connection outbound buffer.
pub const DEFAULT_BUFFER: usize = 64;

/// Push connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConfig {
    pub idle_timeout: Duration,
    pub buffer: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            buffer: DEFAULT_BUFFER,
        }
    }
}

// ---------------------------------------------------------------------------
// PushFrame
// ---------------------------------------------------------------------------

/// One event on the push stream. `id` is the recipient identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushFrame {
    pub id: String,
    pub data: String,
}

impl PushFrame {
    pub fn new(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
        }
    }

    /// First frame sent on every new connection.
    pub fn handshake(recipient: &str) -> Self {
        Self::new(
            recipient,
            format!("EventStream Created. [userEmail={recipient}]"),
        )
    }
}

// ---------------------------------------------------------------------------
// PushSession
// ---------------------------------------------------------------------------

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed by the server (explicit close or shutdown).
    Completed,
    /// No frame for the configured idle timeout.
    IdleTimeout,
    /// Closed from outside, e.g. after a failed write or replacement by a
    /// newer connection.
    Evicted,
    /// The client went away before the session finished.
    Disconnected,
}

/// Owns one open push connection.
pub struct PushSession {
    connection: PushConnection,
    receiver: mpsc::Receiver<PushFrame>,
    closed: CancellationToken,
    idle_timeout: Duration,
    relay: Arc<NotificationRelay>,
    cleaned_up: bool,
}

impl PushSession {
    /// Open a connection for `recipient`.
    ///
    /// Any existing connection for the same recipient on this process is
    /// replaced and told to close. On error nothing stays registered.
    ///
    /// Registration runs on its own task. If the caller stops waiting, the
    /// finished session is dropped there and cleans up after itself.
    pub async fn open(
        relay: Arc<NotificationRelay>,
        recipient: &str,
        config: PushConfig,
    ) -> Result<Self, BusError> {
        let recipient = recipient.to_string();
        let (opened_tx, opened_rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = opened_tx.send(Self::register(relay, &recipient, config).await);
        });
        opened_rx.await.map_err(|_| BusError::Closed)?
    }

    async fn register(
        relay: Arc<NotificationRelay>,
        recipient: &str,
        config: PushConfig,
    ) -> Result<Self, BusError> {
        let (connection, receiver) = PushConnection::new(recipient, config.buffer);

        if let Some(replaced) = relay.registry().add(connection.clone()).await {
            replaced.close();
        }

        if let Err(e) = relay.subscribe(recipient).await {
            relay
                .registry()
                .remove_connection(recipient, connection.id())
                .await;
            return Err(e);
        }

        // The buffer is empty, so the handshake always fits.
        let _ = connection.try_push(PushFrame::handshake(recipient));

        tracing::info!(recipient = %recipient, conn_id = %connection.id(), "Push connection opened");

        Ok(Self {
            closed: connection.close_signal(),
            connection,
            receiver,
            idle_timeout: config.idle_timeout,
            relay,
            cleaned_up: false,
        })
    }

    pub fn connection(&self) -> &PushConnection {
        &self.connection
    }

    /// Wait for the next frame to write to the client.
    ///
    /// Returns `None` once the session is closed; cleanup has run by then.
    pub async fn next_frame(&mut self) -> Option<PushFrame> {
        if self.cleaned_up {
            return None;
        }

        let outcome = tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(CloseReason::Evicted),
            frame = self.receiver.recv() => frame.ok_or(CloseReason::Evicted),
            () = tokio::time::sleep(self.idle_timeout) => Err(CloseReason::IdleTimeout),
        };

        match outcome {
            Ok(frame) => Some(frame),
            Err(reason) => {
                self.finish(reason).await;
                None
            }
        }
    }

    /// Close the session from the server side.
    pub async fn close(mut self) {
        self.finish(CloseReason::Completed).await;
    }

    async fn finish(&mut self, reason: CloseReason) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;
        self.connection.close();

        // Spawned so that dropping this future cannot stop cleanup halfway.
        let relay = Arc::clone(&self.relay);
        let connection = self.connection.clone();
        let task = tokio::spawn(async move { cleanup(&relay, &connection, reason).await });
        if let Err(e) = task.await {
            tracing::error!(recipient = %self.connection.recipient(), error = %e, "Push connection cleanup failed");
        }
    }
}

impl Drop for PushSession {
    fn drop(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;
        self.connection.close();

        let relay = Arc::clone(&self.relay);
        let connection = self.connection.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    cleanup(&relay, &connection, CloseReason::Disconnected).await;
                });
            }
            Err(_) => tracing::error!(
                recipient = %connection.recipient(),
                "No runtime to clean up push connection"
            ),
        }
    }
}

async fn cleanup(relay: &NotificationRelay, connection: &PushConnection, reason: CloseReason) {
    relay
        .registry()
        .remove_connection(connection.recipient(), connection.id())
        .await;
    relay.unsubscribe(connection.recipient()).await;
    let connected_secs = (chrono::Utc::now() - connection.connected_at()).num_seconds();
    tracing::info!(
        recipient = %connection.recipient(),
        conn_id = %connection.id(),
        ?reason,
        connected_secs,
        "Push connection closed"
    );
}
