//! Notification entity model and DTOs.

use rescue_core::notification::{NotificationProperty, NotificationType};
use rescue_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `notifications` table.
///
/// This is also the JSON payload pushed to live connections and returned by
/// the read endpoints.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: DbId,
    pub recipient: String,
    #[sqlx(try_from = "String")]
    pub notification_type: NotificationType,
    #[sqlx(json)]
    pub notification_property: NotificationProperty,
    pub created_at: Timestamp,
    pub checked_at: Option<Timestamp>,
}

/// DTO for inserting a notification. `id` and `created_at` are filled by
/// the database.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateNotification {
    pub recipient: String,
    pub notification_type: NotificationType,
    pub notification_property: NotificationProperty,
}
