//! Handlers for the `/notifications` resource.
//!
//! All endpoints require authentication via [`AuthUser`]. Members may only
//! read and check their own notifications.

use std::collections::HashSet;

use axum::extract::{Path, Query, State};
use axum::Json;
use rescue_core::error::CoreError;
use rescue_core::types::DbId;
use rescue_db::models::notification::Notification;
use rescue_db::repositories::{clamp_limit, clamp_offset, NotificationRepo};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `PATCH /notifications`.
#[derive(Debug, Deserialize, Validate)]
pub struct CheckNotifications {
    #[validate(length(min = 1, max = 100))]
    pub notification_ids: Vec<DbId>,
}

/// Result of a bulk check.
#[derive(Debug, Serialize)]
pub struct CheckedCount {
    pub checked: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/notifications
///
/// The caller's notifications, newest first.
pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<Notification>>>> {
    let limit = clamp_limit(params.limit);
    let offset = clamp_offset(params.offset);

    let notifications =
        NotificationRepo::list_for_recipient(&state.pool, &auth.recipient, limit, offset).await?;

    Ok(Json(DataResponse {
        data: notifications,
    }))
}

/// GET /api/v1/notifications/{id}
///
/// Mark one notification checked and return it.
pub async fn check_notification(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(notification_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Notification>>> {
    let existing = NotificationRepo::find_by_id(&state.pool, notification_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Notification",
            id: notification_id,
        }))?;
    ensure_owner(&auth, &existing)?;

    let checked = NotificationRepo::mark_checked(&state.pool, notification_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Notification",
            id: notification_id,
        }))?;

    Ok(Json(DataResponse { data: checked }))
}

/// PATCH /api/v1/notifications
///
/// Mark every listed notification checked. Nothing is changed unless all
/// of them exist and belong to the caller.
pub async fn check_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CheckNotifications>,
) -> AppResult<Json<DataResponse<CheckedCount>>> {
    input.validate()?;

    let ids: Vec<DbId> = input
        .notification_ids
        .into_iter()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let found = NotificationRepo::find_many(&state.pool, &ids).await?;
    if let Some(missing) = ids
        .iter()
        .copied()
        .find(|id| !found.iter().any(|n| n.id == *id))
    {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Notification",
            id: missing,
        }));
    }
    for notification in &found {
        ensure_owner(&auth, notification)?;
    }

    let checked = NotificationRepo::mark_checked_many(&state.pool, &ids).await?;
    tracing::debug!(recipient = %auth.recipient, checked, "Notifications checked");

    Ok(Json(DataResponse {
        data: CheckedCount { checked },
    }))
}

fn ensure_owner(auth: &AuthUser, notification: &Notification) -> Result<(), AppError> {
    if notification.recipient != auth.recipient {
        return Err(AppError::Core(CoreError::Forbidden(format!(
            "Notification {} belongs to another member",
            notification.id
        ))));
    }
    Ok(())
}
