// Error types for the sync layer

use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while talking to the backend or the identity provider
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport or server failure while reaching the gateway
    #[error("Network error: {0}")]
    Network(String),

    /// The requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend refused the request for the current identity
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A required field check failed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Opening or reading a change feed failed
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Identity provider or token store failure
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SyncError {
    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        SyncError::Network(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        SyncError::NotFound(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        SyncError::PermissionDenied(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        SyncError::Validation(msg.into())
    }

    /// Create a subscription error
    pub fn subscription(msg: impl Into<String>) -> Self {
        SyncError::Subscription(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        SyncError::Auth(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        SyncError::Configuration(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        SyncError::Decode(msg.into())
    }

    /// Message suitable for showing to an end user.
    ///
    /// Internal details are collapsed so that hook state never leaks
    /// transport internals into the presentation layer.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Network(_) => "Unable to reach FarmFit. Check your connection.".to_string(),
            SyncError::NotFound(what) => format!("{} could not be found.", what),
            SyncError::PermissionDenied(_) => {
                "You don't have permission to view this content.".to_string()
            }
            SyncError::Validation(msg) => msg.clone(),
            SyncError::Subscription(_) => "Live updates are unavailable.".to_string(),
            SyncError::Auth(_) => "Please sign in again.".to_string(),
            SyncError::Configuration(msg) => format!("Configuration problem: {}", msg),
            SyncError::Decode(_) | SyncError::Internal(_) => {
                "Something went wrong loading your data.".to_string()
            }
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}
