//! Notification categories, properties, and the transient event value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Recipient, Timestamp};

// ---------------------------------------------------------------------------
// NotificationType
// ---------------------------------------------------------------------------

/// Category of a notification.
///
/// Stored in the `notifications.notification_type` column as the
/// SCREAMING_SNAKE_CASE name returned by [`NotificationType::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// A fridge ingredient is about to pass its expiry date.
    IngredientExpired,
    /// Someone left a review on a recipe the recipient wrote.
    RecipeReviewed,
    /// Daily recipe recommendation.
    RecipeRecommended,
}

impl NotificationType {
    pub const ALL: [NotificationType; 3] = [
        NotificationType::IngredientExpired,
        NotificationType::RecipeReviewed,
        NotificationType::RecipeRecommended,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::IngredientExpired => "INGREDIENT_EXPIRED",
            NotificationType::RecipeReviewed => "RECIPE_REVIEWED",
            NotificationType::RecipeRecommended => "RECIPE_RECOMMENDED",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown notification type '{s}'")))
    }
}

impl TryFrom<String> for NotificationType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// NotificationProperty
// ---------------------------------------------------------------------------

/// What a notification is about.
///
/// Two notifications are duplicates when recipient, type, and this whole
/// struct compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationProperty {
    /// Entity the notification points at (ingredient, reviewed recipe,
    /// recommended recipe).
    pub origin_id: Option<DbId>,
    /// Member that caused the notification, if any.
    pub origin_user_id: Option<DbId>,
    /// Human-readable message body.
    pub contents: String,
}

impl NotificationProperty {
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            origin_id: None,
            origin_user_id: None,
            contents: contents.into(),
        }
    }

    pub fn with_origin(mut self, origin_id: DbId) -> Self {
        self.origin_id = Some(origin_id);
        self
    }

    pub fn with_origin_user(mut self, user_id: DbId) -> Self {
        self.origin_user_id = Some(user_id);
        self
    }
}

// ---------------------------------------------------------------------------
// NotificationEvent
// ---------------------------------------------------------------------------

/// A domain event handed to the notification producer by business logic.
///
/// Consumed once; never persisted as such.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub recipient: Recipient,
    pub notification_type: NotificationType,
    pub property: NotificationProperty,
    pub created_at: Timestamp,
}

impl NotificationEvent {
    pub fn new(
        recipient: impl Into<Recipient>,
        notification_type: NotificationType,
        property: NotificationProperty,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            notification_type,
            property,
            created_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_parse_back() {
        for t in NotificationType::ALL {
            assert_eq!(t.as_str().parse::<NotificationType>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_type_is_validation_error() {
        let err = "RECIPE_DELETED".parse::<NotificationType>().unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn type_serializes_as_screaming_snake_case() {
        let json = serde_json::to_value(NotificationType::IngredientExpired).unwrap();
        assert_eq!(json, "INGREDIENT_EXPIRED");
    }

    #[test]
    fn properties_with_same_fields_are_equal() {
        let a = NotificationProperty::new("Milk expires tomorrow").with_origin(7);
        let b = NotificationProperty::new("Milk expires tomorrow").with_origin(7);
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_origin_user(3));
    }
}
