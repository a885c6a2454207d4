//! Repository for `recipes` and the bookmark/report/review tables that feed
//! its counters.
//!
//! Counter updates are plain read-modify-write: callers load a [`Recipe`],
//! adjust the counters, and write them back with
//! [`RecipeRepo::update_counters`]. Concurrent writers must hold the recipe's
//! distributed lock or updates will be lost.

use rescue_core::types::DbId;
use sqlx::PgPool;

use crate::models::recipe::{CreateReview, Recipe, RecipeReport, RecipeReview};

/// Column list for `recipes` queries.
const COLUMNS: &str =
    "id, author, title, view_count, bookmark_count, report_count, review_count, created_at";

/// Provides CRUD operations for recipes and their counter side tables.
pub struct RecipeRepo;

impl RecipeRepo {
    /// Insert a recipe, returning the created row.
    pub async fn create(pool: &PgPool, author: &str, title: &str) -> Result<Recipe, sqlx::Error> {
        let query = format!(
            "INSERT INTO recipes (author, title) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Recipe>(&query)
            .bind(author)
            .bind(title)
            .fetch_one(pool)
            .await
    }

    /// Find a recipe by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Recipe>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM recipes WHERE id = $1");
        sqlx::query_as::<_, Recipe>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Write back all four counters of a recipe.
    pub async fn update_counters(pool: &PgPool, recipe: &Recipe) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE recipes \
             SET view_count = $2, bookmark_count = $3, report_count = $4, review_count = $5 \
             WHERE id = $1",
        )
        .bind(recipe.id)
        .bind(recipe.view_count)
        .bind(recipe.bookmark_count)
        .bind(recipe.report_count)
        .bind(recipe.review_count)
        .execute(pool)
        .await?;
        Ok(())
    }

    // -- Bookmarks ----------------------------------------------------------

    /// Whether `member` has bookmarked the recipe.
    pub async fn is_bookmarked(
        pool: &PgPool,
        recipe_id: DbId,
        member: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM recipe_bookmarks WHERE recipe_id = $1 AND member = $2)",
        )
        .bind(recipe_id)
        .bind(member)
        .fetch_one(pool)
        .await
    }

    pub async fn add_bookmark(pool: &PgPool, recipe_id: DbId, member: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO recipe_bookmarks (recipe_id, member) VALUES ($1, $2)")
            .bind(recipe_id)
            .bind(member)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn remove_bookmark(
        pool: &PgPool,
        recipe_id: DbId,
        member: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM recipe_bookmarks WHERE recipe_id = $1 AND member = $2")
            .bind(recipe_id)
            .bind(member)
            .execute(pool)
            .await?;
        Ok(())
    }

    // -- Reports ------------------------------------------------------------

    /// Whether `reporter` already filed a report against the recipe.
    pub async fn report_exists(
        pool: &PgPool,
        recipe_id: DbId,
        reporter: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM recipe_reports WHERE recipe_id = $1 AND reporter = $2)",
        )
        .bind(recipe_id)
        .bind(reporter)
        .fetch_one(pool)
        .await
    }

    pub async fn insert_report(
        pool: &PgPool,
        recipe_id: DbId,
        reporter: &str,
        reason: &str,
    ) -> Result<RecipeReport, sqlx::Error> {
        sqlx::query_as::<_, RecipeReport>(
            "INSERT INTO recipe_reports (recipe_id, reporter, reason) \
             VALUES ($1, $2, $3) \
             RETURNING id, recipe_id, reporter, reason, created_at",
        )
        .bind(recipe_id)
        .bind(reporter)
        .bind(reason)
        .fetch_one(pool)
        .await
    }

    // -- Reviews ------------------------------------------------------------

    pub async fn insert_review(
        pool: &PgPool,
        recipe_id: DbId,
        author: &str,
        input: &CreateReview,
    ) -> Result<RecipeReview, sqlx::Error> {
        sqlx::query_as::<_, RecipeReview>(
            "INSERT INTO recipe_reviews (recipe_id, author, title, contents) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, recipe_id, author, title, contents, created_at",
        )
        .bind(recipe_id)
        .bind(author)
        .bind(&input.title)
        .bind(&input.contents)
        .fetch_one(pool)
        .await
    }
}
