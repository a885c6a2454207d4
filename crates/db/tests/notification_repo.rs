//! Integration tests for the notification and recipe repositories.

use rescue_core::notification::{NotificationProperty, NotificationType};
use rescue_db::models::notification::CreateNotification;
use rescue_db::models::recipe::CreateReview;
use rescue_db::repositories::{NotificationRepo, RecipeRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn expired_milk(recipient: &str) -> CreateNotification {
    CreateNotification {
        recipient: recipient.to_string(),
        notification_type: NotificationType::IngredientExpired,
        notification_property: NotificationProperty::new("Milk expires tomorrow").with_origin(7),
    }
}

async fn count_matching(pool: &PgPool, input: &CreateNotification) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications \
         WHERE recipient = $1 AND notification_type = $2 AND notification_property = $3",
    )
    .bind(&input.recipient)
    .bind(input.notification_type.as_str())
    .bind(sqlx::types::Json(&input.notification_property))
    .fetch_one(pool)
    .await
    .unwrap()
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn insert_then_exists_matches_exact_tuple(pool: PgPool) {
    let input = expired_milk("u1@example.com");
    assert!(!NotificationRepo::exists_by_recipient_type_property(&pool, &input)
        .await
        .unwrap());

    let row = NotificationRepo::insert(&pool, &input)
        .await
        .unwrap()
        .expect("first insert must store a row");
    assert_eq!(row.recipient, "u1@example.com");
    assert_eq!(row.notification_type, NotificationType::IngredientExpired);
    assert_eq!(row.notification_property.origin_id, Some(7));
    assert!(row.checked_at.is_none());

    assert!(NotificationRepo::exists_by_recipient_type_property(&pool, &input)
        .await
        .unwrap());

    // Same recipient, different property: not a duplicate.
    let mut other = input.clone();
    other.notification_property = NotificationProperty::new("Eggs expire tomorrow").with_origin(8);
    assert!(!NotificationRepo::exists_by_recipient_type_property(&pool, &other)
        .await
        .unwrap());
}

#[sqlx::test]
async fn duplicate_insert_is_a_no_op(pool: PgPool) {
    let input = expired_milk("u1@example.com");

    let first = NotificationRepo::insert(&pool, &input).await.unwrap();
    let second = NotificationRepo::insert(&pool, &input).await.unwrap();

    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(count_matching(&pool, &input).await, 1);
}

#[sqlx::test]
async fn list_is_scoped_to_recipient_and_newest_first(pool: PgPool) {
    let mut a = expired_milk("u1@example.com");
    NotificationRepo::insert(&pool, &a).await.unwrap();
    a.notification_property.contents = "Butter expires tomorrow".into();
    NotificationRepo::insert(&pool, &a).await.unwrap();
    NotificationRepo::insert(&pool, &expired_milk("u2@example.com"))
        .await
        .unwrap();

    let rows = NotificationRepo::list_for_recipient(&pool, "u1@example.com", 10, 0)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].notification_property.contents, "Butter expires tomorrow");
}

#[sqlx::test]
async fn mark_checked_keeps_first_timestamp(pool: PgPool) {
    let row = NotificationRepo::insert(&pool, &expired_milk("u1@example.com"))
        .await
        .unwrap()
        .unwrap();

    let first = NotificationRepo::mark_checked(&pool, row.id)
        .await
        .unwrap()
        .unwrap();
    let second = NotificationRepo::mark_checked(&pool, row.id)
        .await
        .unwrap()
        .unwrap();

    assert!(first.checked_at.is_some());
    assert_eq!(first.checked_at, second.checked_at);
    assert!(NotificationRepo::mark_checked(&pool, row.id + 1000)
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Recipes
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn recipe_counters_round_trip(pool: PgPool) {
    let mut recipe = RecipeRepo::create(&pool, "chef@example.com", "Kimchi stew")
        .await
        .unwrap();
    assert_eq!(recipe.bookmark_count, 0);

    recipe.bookmark_count = 3;
    recipe.view_count = 10;
    RecipeRepo::update_counters(&pool, &recipe).await.unwrap();

    let reloaded = RecipeRepo::find_by_id(&pool, recipe.id).await.unwrap().unwrap();
    assert_eq!(reloaded.bookmark_count, 3);
    assert_eq!(reloaded.view_count, 10);
}

#[sqlx::test]
async fn bookmark_report_and_review_rows(pool: PgPool) {
    let recipe = RecipeRepo::create(&pool, "chef@example.com", "Kimchi stew")
        .await
        .unwrap();

    RecipeRepo::add_bookmark(&pool, recipe.id, "fan@example.com")
        .await
        .unwrap();
    assert!(RecipeRepo::is_bookmarked(&pool, recipe.id, "fan@example.com")
        .await
        .unwrap());
    RecipeRepo::remove_bookmark(&pool, recipe.id, "fan@example.com")
        .await
        .unwrap();
    assert!(!RecipeRepo::is_bookmarked(&pool, recipe.id, "fan@example.com")
        .await
        .unwrap());

    RecipeRepo::insert_report(&pool, recipe.id, "fan@example.com", "spam")
        .await
        .unwrap();
    assert!(RecipeRepo::report_exists(&pool, recipe.id, "fan@example.com")
        .await
        .unwrap());
    let dup = RecipeRepo::insert_report(&pool, recipe.id, "fan@example.com", "spam").await;
    assert!(dup.is_err(), "second report by the same member must violate uq_ constraint");

    let review = RecipeRepo::insert_review(
        &pool,
        recipe.id,
        "fan@example.com",
        &CreateReview {
            title: "Great".into(),
            contents: "Tasty".into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(review.recipe_id, recipe.id);
}
