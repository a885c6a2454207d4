/// Failure talking to the lock authority.
#[derive(Debug, thiserror::Error)]
pub enum LockStoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Lock store timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Lock store unavailable: {0}")]
    Unavailable(String),
}

/// Why a lock could not be acquired.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The wait bound elapsed while another holder kept the lock.
    #[error("Lock '{name}' is busy, please try again shortly")]
    AcquisitionDenied { name: String },

    /// The authority could not be reached or returned an error.
    #[error("Lock service unavailable while acquiring '{name}': {source}")]
    ServiceUnavailable {
        name: String,
        #[source]
        source: LockStoreError,
    },

    /// The prefix was empty.
    #[error("Invalid lock name: {0}")]
    InvalidName(String),
}

impl LockError {
    /// Whether the client may simply retry the request later.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, LockError::InvalidName(_))
    }
}
