//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod notification_repo;
pub mod recipe_repo;

pub use notification_repo::NotificationRepo;
pub use recipe_repo::RecipeRepo;

/// Default page size for list queries.
pub const DEFAULT_LIMIT: i64 = 20;

/// Hard upper bound on page size.
pub const MAX_LIMIT: i64 = 100;

/// Clamp a caller-supplied page size into `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Clamp a caller-supplied offset to be non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}
