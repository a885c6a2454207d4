pub mod health;
pub mod notification;
pub mod recipe;

use axum::Router;

use crate::state::AppState;

/// Push stream endpoint. Mounted by the app router beside
/// [`api_routes`] with its own trace layer.
pub const PUSH_STREAM_PATH: &str = "/api/v1/notifications/subscribe";

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /notifications                     list, check many (PATCH)
/// /notifications/{id}                check one
///
/// /recipes                           create
/// /recipes/{id}                      get (counts a view)
/// /recipes/{id}/bookmark             toggle bookmark (POST)
/// /recipes/{id}/reports              file report (POST)
/// /recipes/{id}/reviews              post review (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/notifications", notification::router())
        .nest("/recipes", recipe::router())
}
