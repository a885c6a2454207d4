//! Route definitions for the `/recipes` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::recipe;
use crate::state::AppState;

/// Routes mounted at `/recipes`.
///
/// ```text
/// POST   /                 -> create_recipe
/// GET    /{id}             -> get_recipe
/// POST   /{id}/bookmark    -> toggle_bookmark
/// POST   /{id}/reports     -> report_recipe
/// POST   /{id}/reviews     -> review_recipe
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(recipe::create_recipe))
        .route("/{id}", get(recipe::get_recipe))
        .route("/{id}/bookmark", post(recipe::toggle_bookmark))
        .route("/{id}/reports", post(recipe::report_recipe))
        .route("/{id}/reviews", post(recipe::review_recipe))
}
