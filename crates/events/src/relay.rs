//! Cross-process notification relay.
//!
//! [`NotificationRelay`] publishes persisted notifications on the recipient's
//! bus channel and, on receipt from the bus, writes them to the recipient's
//! live connection if this process holds one.

use std::collections::HashMap;
use std::sync::Arc;

use rescue_core::naming::{channel_name, recipient_from_channel};
use rescue_db::models::notification::Notification;
use tokio::sync::{broadcast, Mutex};

use crate::bus::{BusMessage, MessageBus};
use crate::error::BusError;
use crate::registry::PushConnectionRegistry;
use crate::session::PushFrame;

/// Bridges the [`MessageBus`] and the local [`PushConnectionRegistry`].
pub struct NotificationRelay {
    bus: Arc<dyn MessageBus>,
    registry: Arc<PushConnectionRegistry>,
    /// Open push connections per recipient. The bus subscription exists
    /// while the count is non-zero.
    subscriptions: Mutex<HashMap<String, usize>>,
}

impl NotificationRelay {
    pub fn new(bus: Arc<dyn MessageBus>, registry: Arc<PushConnectionRegistry>) -> Self {
        Self {
            bus,
            registry,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<PushConnectionRegistry> {
        &self.registry
    }

    /// Listen on `recipient`'s channel. Called once per opened connection.
    pub async fn subscribe(&self, recipient: &str) -> Result<(), BusError> {
        let mut subs = self.subscriptions.lock().await;
        let count = subs.get(recipient).copied().unwrap_or(0);
        if count == 0 {
            self.bus.subscribe(&channel_name(recipient)).await?;
            tracing::debug!(recipient = %recipient, "Subscribed to notification channel");
        }
        subs.insert(recipient.to_string(), count + 1);
        Ok(())
    }

    /// Drop one connection's interest in `recipient`'s channel. The bus
    /// subscription is removed with the last one. Never fails.
    pub async fn unsubscribe(&self, recipient: &str) {
        let mut subs = self.subscriptions.lock().await;
        let Some(count) = subs.get_mut(recipient) else {
            tracing::warn!(recipient = %recipient, "Unsubscribe without matching subscribe");
            return;
        };

        *count -= 1;
        if *count > 0 {
            return;
        }
        subs.remove(recipient);

        match self.bus.unsubscribe(&channel_name(recipient)).await {
            Ok(()) => tracing::debug!(recipient = %recipient, "Unsubscribed from notification channel"),
            Err(e) => tracing::error!(recipient = %recipient, error = %e, "Bus unsubscribe failed"),
        }
    }

    /// Number of recipients with an active bus subscription.
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.lock().await.len()
    }

    /// Publish a persisted notification on its recipient's channel.
    pub async fn deliver(&self, notification: &Notification) -> Result<(), BusError> {
        let payload = serde_json::to_string(notification)?;
        self.bus
            .publish(&channel_name(&notification.recipient), &payload)
            .await?;
        tracing::debug!(
            recipient = %notification.recipient,
            notification_id = notification.id,
            "Notification published"
        );
        Ok(())
    }

    /// Consume the bus's inbound messages until the bus is dropped.
    pub async fn run(self: Arc<Self>, mut receiver: broadcast::Receiver<BusMessage>) {
        loop {
            match receiver.recv().await {
                Ok(msg) => self.dispatch(&msg).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification relay lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Message bus closed, notification relay shutting down");
                    break;
                }
            }
        }
    }

    /// Write one bus message to the local connection, if any.
    pub async fn dispatch(&self, msg: &BusMessage) {
        let Some(recipient) = recipient_from_channel(&msg.channel) else {
            tracing::debug!(channel = %msg.channel, "Ignoring message on foreign channel");
            return;
        };

        let Some(conn) = self.registry.find(recipient).await else {
            tracing::debug!(recipient = %recipient, "No local connection, dropping notification");
            return;
        };

        match conn.try_push(PushFrame::new(recipient, msg.payload.clone())) {
            Ok(()) => tracing::debug!(recipient = %recipient, "Notification pushed"),
            Err(e) => {
                tracing::warn!(
                    recipient = %recipient,
                    conn_id = %conn.id(),
                    error = %e,
                    "Push failed, dropping connection"
                );
                self.registry.remove_connection(recipient, conn.id()).await;
                conn.close();
            }
        }
    }
}
