/// Error type for query and mutation operations.
///
/// Errors are stored on cache entries and handed to every subscriber of a key,
/// so the type is cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Transport-level failure. Retried by the fetch coordinator.
    #[error("network error: {message}")]
    Network { message: String },
    /// The requested resource does not exist.
    #[error("not found: {resource}")]
    NotFound { resource: String },
    /// The remote side rejected a mutation input.
    #[error("validation failed: {message}")]
    Validation { message: String },
    /// The payload could not be decoded into the expected entity.
    #[error("decode error: {0}")]
    Decode(String),
    /// The owning client has been torn down.
    #[error("query client is closed")]
    Closed,
}

impl SyncError {
    /// Create a new network error.
    pub fn network(message: impl Into<String>) -> Self {
        SyncError::Network {
            message: message.into(),
        }
    }

    /// Create a new not-found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        SyncError::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a new validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        SyncError::Validation {
            message: message.into(),
        }
    }

    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network { .. })
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}
