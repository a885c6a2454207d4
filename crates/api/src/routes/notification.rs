//! Route definitions for the `/notifications` resource.
//!
//! All endpoints require authentication. The push stream lives beside these
//! at [`PUSH_STREAM_PATH`](super::PUSH_STREAM_PATH).

use axum::routing::get;
use axum::Router;

use crate::handlers::notification;
use crate::state::AppState;

/// Routes mounted at `/notifications`.
///
/// ```text
/// GET    /              -> list_notifications
/// PATCH  /              -> check_notifications
/// GET    /{id}          -> check_notification
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(notification::list_notifications).patch(notification::check_notifications),
        )
        .route("/{id}", get(notification::check_notification))
}
