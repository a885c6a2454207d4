//! Persistence collaborator for notifications.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rescue_core::types::DbId;
use rescue_db::models::notification::{CreateNotification, Notification};
use rescue_db::repositories::NotificationRepo;
use rescue_db::DbPool;

use crate::error::StoreError;

/// What the producer needs from notification storage.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Whether a row with the same recipient, type, and property exists.
    async fn exists(&self, candidate: &CreateNotification) -> Result<bool, StoreError>;

    /// Persist `candidate`. `Ok(None)` means the storage layer itself
    /// recognised a duplicate and stored nothing.
    async fn save(&self, candidate: &CreateNotification) -> Result<Option<Notification>, StoreError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<Notification>, StoreError>;

    /// A page of `recipient`'s notifications, newest first.
    async fn find_by_recipient(
        &self,
        recipient: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, StoreError>;
}

// ---------------------------------------------------------------------------
// PgNotificationStore
// ---------------------------------------------------------------------------

/// [`NotificationStore`] over the `notifications` table.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: DbPool,
}

impl PgNotificationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn exists(&self, candidate: &CreateNotification) -> Result<bool, StoreError> {
        Ok(NotificationRepo::exists_by_recipient_type_property(&self.pool, candidate).await?)
    }

    async fn save(&self, candidate: &CreateNotification) -> Result<Option<Notification>, StoreError> {
        Ok(NotificationRepo::insert(&self.pool, candidate).await?)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Notification>, StoreError> {
        Ok(NotificationRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_by_recipient(
        &self,
        recipient: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        Ok(NotificationRepo::list_for_recipient(&self.pool, recipient, limit, offset).await?)
    }
}

// ---------------------------------------------------------------------------
// MemoryNotificationStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    rows: Mutex<Vec<Notification>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

/// Process-local [`NotificationStore`].
///
/// Unlike the Postgres store it has no uniqueness constraint: `save` always
/// inserts, so dedup relies entirely on the producer's `exists` check.
#[derive(Clone, Default)]
pub struct MemoryNotificationStore {
    inner: Arc<Inner>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows matching `candidate`'s recipient, type, and property.
    pub fn count_matching(&self, candidate: &CreateNotification) -> usize {
        self.rows().iter().filter(|row| matches(row, candidate)).count()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory notification store switched off".to_string(),
            ));
        }
        Ok(())
    }

    fn rows(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.inner
            .rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn matches(row: &Notification, candidate: &CreateNotification) -> bool {
    row.recipient == candidate.recipient
        && row.notification_type == candidate.notification_type
        && row.notification_property == candidate.notification_property
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn exists(&self, candidate: &CreateNotification) -> Result<bool, StoreError> {
        self.check_available()?;
        let found = self.rows().iter().any(|row| matches(row, candidate));
        // Leave a gap between the check and a following save, as a real
        // round trip would.
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn save(&self, candidate: &CreateNotification) -> Result<Option<Notification>, StoreError> {
        self.check_available()?;
        let row = Notification {
            id: self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            recipient: candidate.recipient.clone(),
            notification_type: candidate.notification_type,
            notification_property: candidate.notification_property.clone(),
            created_at: chrono::Utc::now(),
            checked_at: None,
        };
        self.rows().push(row.clone());
        Ok(Some(row))
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Notification>, StoreError> {
        self.check_available()?;
        Ok(self.rows().iter().find(|row| row.id == id).cloned())
    }

    async fn find_by_recipient(
        &self,
        recipient: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        self.check_available()?;
        let mut rows: Vec<Notification> = self
            .rows()
            .iter()
            .filter(|row| row.recipient == recipient)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }
}
