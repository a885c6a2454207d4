//! Entry point for business logic that wants to notify someone.

use std::sync::Arc;

use rescue_core::notification::{NotificationEvent, NotificationProperty, NotificationType};
use rescue_db::models::notification::{CreateNotification, Notification};
use tokio::task::JoinHandle;

use crate::error::ProducerError;
use crate::relay::NotificationRelay;
use crate::store::NotificationStore;

/// Result of [`NotificationProducer::publish`].
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// A new row was stored and handed to the relay.
    Published(Notification),
    /// An identical notification already existed; nothing was stored or sent.
    Duplicate,
}

/// Deduplicates, persists, and relays notifications.
#[derive(Clone)]
pub struct NotificationProducer {
    store: Arc<dyn NotificationStore>,
    relay: Arc<NotificationRelay>,
}

impl NotificationProducer {
    pub fn new(store: Arc<dyn NotificationStore>, relay: Arc<NotificationRelay>) -> Self {
        Self { store, relay }
    }

    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    /// Produce one notification and wait until it is stored.
    ///
    /// Only storage failures are returned. A failed bus publish is logged;
    /// the stored row stays readable through the read endpoints.
    pub async fn publish(
        &self,
        recipient: &str,
        notification_type: NotificationType,
        property: NotificationProperty,
    ) -> Result<PublishOutcome, ProducerError> {
        let candidate = CreateNotification {
            recipient: recipient.to_string(),
            notification_type,
            notification_property: property,
        };

        // Check-then-insert is not atomic; the storage layer's own
        // uniqueness (where it has one) catches what slips through.
        if self.store.exists(&candidate).await? {
            tracing::debug!(
                recipient = %recipient,
                notification_type = %notification_type,
                "Duplicate notification skipped"
            );
            return Ok(PublishOutcome::Duplicate);
        }

        let Some(notification) = self.store.save(&candidate).await? else {
            tracing::debug!(
                recipient = %recipient,
                notification_type = %notification_type,
                "Concurrent duplicate notification skipped"
            );
            return Ok(PublishOutcome::Duplicate);
        };

        tracing::info!(
            recipient = %recipient,
            notification_id = notification.id,
            notification_type = %notification_type,
            "Notification stored"
        );

        if let Err(e) = self.relay.deliver(&notification).await {
            tracing::warn!(
                recipient = %recipient,
                notification_id = notification.id,
                error = %e,
                "Notification delivery failed"
            );
        }

        Ok(PublishOutcome::Published(notification))
    }

    /// Fire-and-forget variant for request handlers.
    ///
    /// The returned handle may be ignored; every failure is logged.
    pub fn publish_event(&self, event: NotificationEvent) -> JoinHandle<()> {
        let producer = self.clone();
        tokio::spawn(async move {
            let result = producer
                .publish(&event.recipient, event.notification_type, event.property)
                .await;
            if let Err(e) = result {
                tracing::error!(
                    recipient = %event.recipient,
                    notification_type = %event.notification_type,
                    error = %e,
                    "Failed to produce notification"
                );
            }
        })
    }
}
