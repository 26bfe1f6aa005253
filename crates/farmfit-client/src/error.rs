// Transport errors for the HTTP adapters

use farmfit_core::SyncError;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not found")]
    NotFound,

    #[error("Unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Invalid payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Classify a non-success response
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::NOT_FOUND => ClientError::NotFound,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Unauthorized {
                status: status.as_u16(),
                message,
            },
            _ => ClientError::Api {
                status: status.as_u16(),
                message,
            },
        }
    }
}

impl From<ClientError> for SyncError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) if e.is_decode() => SyncError::decode(e.to_string()),
            ClientError::Http(e) => SyncError::network(e.to_string()),
            ClientError::Api { status, message } => {
                SyncError::network(format!("server returned {status}: {message}"))
            }
            ClientError::NotFound => SyncError::not_found("resource not found"),
            ClientError::Unauthorized { status, message } => {
                SyncError::permission_denied(format!("{status}: {message}"))
            }
            ClientError::Decode(e) => SyncError::decode(e.to_string()),
            ClientError::Url(e) => SyncError::config(e.to_string()),
            ClientError::Io(e) => SyncError::Internal(anyhow::Error::new(e)),
        }
    }
}
