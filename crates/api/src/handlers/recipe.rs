//! Handlers for the `/recipes` resource.
//!
//! Every counter update is a read-modify-write of the recipe row and runs
//! inside the recipe's critical section (`{operation}:{recipe_id}`).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rescue_core::error::CoreError;
use rescue_core::naming::{
    LOCK_BOOKMARK_RECIPE, LOCK_GET_RECIPE, LOCK_REPORT_RECIPE, LOCK_REVIEW_RECIPE,
};
use rescue_core::notification::{NotificationEvent, NotificationProperty, NotificationType};
use rescue_core::types::DbId;
use rescue_db::models::recipe::{
    CreateRecipe, CreateReport, CreateReview, Recipe, RecipeReport, RecipeReview,
};
use rescue_db::repositories::RecipeRepo;
use rescue_db::DbPool;
use serde::Serialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Bookmark state after a toggle.
#[derive(Debug, Serialize)]
pub struct BookmarkStatus {
    pub bookmark_count: i64,
    pub is_bookmarked: bool,
}

/// A review as submitted, before the recipe lock is taken.
struct ReviewRequest {
    recipe_id: DbId,
    reviewer: String,
    review: CreateReview,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/recipes
pub async fn create_recipe(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateRecipe>,
) -> AppResult<(StatusCode, Json<DataResponse<Recipe>>)> {
    input.validate()?;

    let recipe = RecipeRepo::create(&state.pool, &auth.recipient, &input.title).await?;
    tracing::info!(recipe_id = recipe.id, author = %recipe.author, "Recipe created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: recipe })))
}

/// GET /api/v1/recipes/{id}
///
/// Returns the recipe and counts the view.
pub async fn get_recipe(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(recipe_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Recipe>>> {
    let pool = &state.pool;
    let recipe = state
        .locks
        .guard(LOCK_GET_RECIPE, recipe_id, || async move {
            let mut recipe = load_recipe(pool, recipe_id).await?;
            recipe.view_count += 1;
            RecipeRepo::update_counters(pool, &recipe).await?;
            Ok::<_, AppError>(recipe)
        })
        .await?;

    Ok(Json(DataResponse { data: recipe }))
}

/// POST /api/v1/recipes/{id}/bookmark
///
/// Adds the caller's bookmark, or removes it if present.
pub async fn toggle_bookmark(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(recipe_id): Path<DbId>,
) -> AppResult<Json<DataResponse<BookmarkStatus>>> {
    let pool = &state.pool;
    let member = auth.recipient.as_str();
    let status = state
        .locks
        .guard(LOCK_BOOKMARK_RECIPE, recipe_id, || async move {
            let mut recipe = load_recipe(pool, recipe_id).await?;

            let is_bookmarked = if RecipeRepo::is_bookmarked(pool, recipe_id, member).await? {
                RecipeRepo::remove_bookmark(pool, recipe_id, member).await?;
                recipe.bookmark_count = (recipe.bookmark_count - 1).max(0);
                false
            } else {
                RecipeRepo::add_bookmark(pool, recipe_id, member).await?;
                recipe.bookmark_count += 1;
                true
            };
            RecipeRepo::update_counters(pool, &recipe).await?;

            Ok::<_, AppError>(BookmarkStatus {
                bookmark_count: recipe.bookmark_count,
                is_bookmarked,
            })
        })
        .await?;

    tracing::debug!(
        recipe_id,
        member = %auth.recipient,
        is_bookmarked = status.is_bookmarked,
        "Bookmark toggled"
    );
    Ok(Json(DataResponse { data: status }))
}

/// POST /api/v1/recipes/{id}/reports
///
/// Files a report. Each member may report a recipe once.
pub async fn report_recipe(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(recipe_id): Path<DbId>,
    Json(input): Json<CreateReport>,
) -> AppResult<(StatusCode, Json<DataResponse<RecipeReport>>)> {
    input.validate()?;

    let pool = &state.pool;
    let reporter = auth.recipient.as_str();
    let report = state
        .locks
        .guard(LOCK_REPORT_RECIPE, recipe_id, || async move {
            let mut recipe = load_recipe(pool, recipe_id).await?;
            if RecipeRepo::report_exists(pool, recipe_id, reporter).await? {
                return Err(AppError::Core(CoreError::Conflict(
                    "You have already reported this recipe".into(),
                )));
            }

            let report = RecipeRepo::insert_report(pool, recipe_id, reporter, &input.reason).await?;
            recipe.report_count += 1;
            RecipeRepo::update_counters(pool, &recipe).await?;
            Ok(report)
        })
        .await?;

    tracing::info!(recipe_id, reporter = %auth.recipient, "Recipe reported");
    Ok((StatusCode::CREATED, Json(DataResponse { data: report })))
}

/// POST /api/v1/recipes/{id}/reviews
///
/// Posts a review and notifies the recipe's author. Authors reviewing
/// their own recipe are not notified.
pub async fn review_recipe(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(recipe_id): Path<DbId>,
    Json(input): Json<CreateReview>,
) -> AppResult<(StatusCode, Json<DataResponse<RecipeReview>>)> {
    input.validate()?;

    let pool = &state.pool;
    let request = ReviewRequest {
        recipe_id,
        reviewer: auth.recipient,
        review: input,
    };
    let (recipe, review) = state
        .locks
        .guard_with(
            LOCK_REVIEW_RECIPE,
            request,
            |req| req.recipe_id,
            |req| async move {
                let mut recipe = load_recipe(pool, req.recipe_id).await?;
                let review =
                    RecipeRepo::insert_review(pool, req.recipe_id, &req.reviewer, &req.review)
                        .await?;
                recipe.review_count += 1;
                RecipeRepo::update_counters(pool, &recipe).await?;
                Ok::<_, AppError>((recipe, review))
            },
        )
        .await?;

    if recipe.author != review.author {
        state.producer.publish_event(NotificationEvent::new(
            recipe.author.as_str(),
            NotificationType::RecipeReviewed,
            NotificationProperty::new(format!(
                "{} left a review on {}",
                review.author, recipe.title
            ))
            .with_origin(recipe.id),
        ));
    }

    tracing::info!(recipe_id, reviewer = %review.author, "Recipe reviewed");
    Ok((StatusCode::CREATED, Json(DataResponse { data: review })))
}

async fn load_recipe(pool: &DbPool, recipe_id: DbId) -> Result<Recipe, AppError> {
    RecipeRepo::find_by_id(pool, recipe_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Recipe",
            id: recipe_id,
        }))
}
