//! Naming conventions for distributed lock keys and pub/sub channels.
//!
//! Every process derives these names independently, so the formats here are
//! part of the wire contract between server instances.

use crate::error::CoreError;

/// Separator between a lock prefix and the guarded resource key.
pub const LOCK_NAME_SEPARATOR: &str = ":";

/// Prefix for per-recipient notification channels on the message bus.
pub const CHANNEL_PREFIX: &str = "channel:";

/// Lock prefix for bookmark toggles on a recipe.
pub const LOCK_BOOKMARK_RECIPE: &str = "bookmark_recipe";

/// Lock prefix for filing a report against a recipe.
pub const LOCK_REPORT_RECIPE: &str = "report_recipe";

/// Lock prefix for posting a review on a recipe.
pub const LOCK_REVIEW_RECIPE: &str = "review_recipe";

/// Lock prefix for the fetch-and-increment of a recipe's view counter.
pub const LOCK_GET_RECIPE: &str = "get_recipe";

/// Build the distributed lock name for a resource.
///
/// # Examples
///
/// ```
/// use rescue_core::naming::lock_name;
///
/// assert_eq!(lock_name("bookmark_recipe", "42"), "bookmark_recipe:42");
/// ```
pub fn lock_name(prefix: &str, key: &str) -> String {
    format!("{prefix}{LOCK_NAME_SEPARATOR}{key}")
}

/// Reject empty lock prefixes; an empty namespace would collide across
/// unrelated resources.
pub fn validate_lock_prefix(prefix: &str) -> Result<(), CoreError> {
    if prefix.trim().is_empty() {
        return Err(CoreError::Validation(
            "Lock prefix must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Bus channel carrying notifications for a single recipient.
///
/// # Examples
///
/// ```
/// use rescue_core::naming::channel_name;
///
/// assert_eq!(channel_name("cook@example.com"), "channel:cook@example.com");
/// ```
pub fn channel_name(recipient: &str) -> String {
    format!("{CHANNEL_PREFIX}{recipient}")
}

/// Recover the recipient from a channel name produced by [`channel_name`].
///
/// Returns `None` for channels outside the notification namespace.
pub fn recipient_from_channel(channel: &str) -> Option<&str> {
    channel.strip_prefix(CHANNEL_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_name_joins_prefix_and_key() {
        assert_eq!(lock_name(LOCK_REPORT_RECIPE, "7"), "report_recipe:7");
    }

    #[test]
    fn empty_prefix_is_rejected() {
        assert!(validate_lock_prefix("").is_err());
        assert!(validate_lock_prefix("   ").is_err());
        assert!(validate_lock_prefix(LOCK_GET_RECIPE).is_ok());
    }

    #[test]
    fn channel_round_trips_recipient() {
        let channel = channel_name("u1@example.com");
        assert_eq!(recipient_from_channel(&channel), Some("u1@example.com"));
    }

    #[test]
    fn foreign_channel_has_no_recipient() {
        assert_eq!(recipient_from_channel("other:u1"), None);
    }

    #[test]
    fn recipient_containing_prefix_text_is_preserved() {
        let channel = channel_name("channel:odd");
        assert_eq!(recipient_from_channel(&channel), Some("channel:odd"));
    }
}
