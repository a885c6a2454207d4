//! Recipe entity models and DTOs.
//!
//! Only the columns touched by the guarded counter operations are modelled.

use rescue_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `recipes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Recipe {
    pub id: DbId,
    pub author: String,
    pub title: String,
    pub view_count: i64,
    pub bookmark_count: i64,
    pub report_count: i64,
    pub review_count: i64,
    pub created_at: Timestamp,
}

/// DTO for creating a recipe.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRecipe {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}

/// DTO for filing a report against a recipe.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReport {
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
}

/// A row from the `recipe_reports` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RecipeReport {
    pub id: DbId,
    pub recipe_id: DbId,
    pub reporter: String,
    pub reason: String,
    pub created_at: Timestamp,
}

/// A row from the `recipe_reviews` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RecipeReview {
    pub id: DbId,
    pub recipe_id: DbId,
    pub author: String,
    pub title: String,
    pub contents: String,
    pub created_at: Timestamp,
}

/// DTO for posting a review.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReview {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub contents: String,
}
