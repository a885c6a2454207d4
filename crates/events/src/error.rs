/// Failure talking to the publish/subscribe transport.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The bus pump has stopped; no further commands are accepted.
    #[error("Message bus closed")]
    Closed,
}

/// Failure in the notification persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Notification store unavailable: {0}")]
    Unavailable(String),
}

/// Failure producing a notification. Delivery problems never surface here.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a frame could not be queued on a push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    /// The client is not draining its buffer.
    #[error("Push buffer full")]
    Full,

    /// The connection is already closed.
    #[error("Push connection closed")]
    Closed,
}
