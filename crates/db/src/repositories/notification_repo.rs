//! Repository for the `notifications` table.

use rescue_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::notification::{CreateNotification, Notification};

/// Column list for `notifications` queries.
const COLUMNS: &str =
    "id, recipient, notification_type, notification_property, created_at, checked_at";

/// Provides CRUD operations for notifications.
pub struct NotificationRepo;

impl NotificationRepo {
    /// Whether a notification with exactly this recipient, type, and
    /// property already exists.
    pub async fn exists_by_recipient_type_property(
        pool: &PgPool,
        input: &CreateNotification,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM notifications \
                WHERE recipient = $1 \
                  AND notification_type = $2 \
                  AND notification_property = $3 \
             )",
        )
        .bind(&input.recipient)
        .bind(input.notification_type.as_str())
        .bind(Json(&input.notification_property))
        .fetch_one(pool)
        .await
    }

    /// Insert a notification, returning the stored row.
    ///
    /// Returns `None` when an identical row already exists; the unique index
    /// on `(recipient, notification_type, notification_property)` makes the
    /// insert a no-op instead of an error.
    pub async fn insert(
        pool: &PgPool,
        input: &CreateNotification,
    ) -> Result<Option<Notification>, sqlx::Error> {
        let query = format!(
            "INSERT INTO notifications (recipient, notification_type, notification_property) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (recipient, notification_type, notification_property) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, Notification>(&query)
            .bind(&input.recipient)
            .bind(input.notification_type.as_str())
            .bind(Json(&input.notification_property))
            .fetch_optional(pool)
            .await?;
        if row.is_none() {
            tracing::debug!(
                recipient = %input.recipient,
                notification_type = %input.notification_type,
                "Notification insert hit the uniqueness index"
            );
        }
        Ok(row)
    }

    /// Find a notification by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Notification>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM notifications WHERE id = $1");
        sqlx::query_as::<_, Notification>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a recipient's notifications, newest first.
    pub async fn list_for_recipient(
        pool: &PgPool,
        recipient: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE recipient = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(recipient)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Stamp `checked_at = NOW()` on a single notification.
    ///
    /// A notification that was already checked keeps its original timestamp.
    pub async fn mark_checked(pool: &PgPool, id: DbId) -> Result<Option<Notification>, sqlx::Error> {
        let query = format!(
            "UPDATE notifications \
             SET checked_at = COALESCE(checked_at, NOW()) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Stamp `checked_at` on every listed notification in one statement.
    ///
    /// Returns the number of rows touched.
    pub async fn mark_checked_many(pool: &PgPool, ids: &[DbId]) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET checked_at = COALESCE(checked_at, NOW()) \
             WHERE id = ANY($1)",
        )
        .bind(ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Fetch several notifications by ID. Missing IDs are simply absent from
    /// the result.
    pub async fn find_many(pool: &PgPool, ids: &[DbId]) -> Result<Vec<Notification>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM notifications WHERE id = ANY($1)");
        sqlx::query_as::<_, Notification>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }
}
