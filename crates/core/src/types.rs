/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque subscriber identity resolved from an authenticated request.
///
/// In practice this is the member's email address.
pub type Recipient = String;
