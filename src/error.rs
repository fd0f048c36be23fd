// Error handling module
// Defines the error types surfaced by the credential store, the token refresh
// exchange and the authenticated request pipeline

use serde_json::Value;
use thiserror::Error;

use crate::http_client::TransportError;

/// Errors raised by a credential store backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend I/O or database failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Value could not be encoded for storage
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Reasons a refresh-token exchange can fail
///
/// Cloneable so a single in-flight refresh can hand the same outcome to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RefreshError {
    /// No refresh token is held
    #[error("No refresh token available")]
    MissingRefreshToken,

    /// The refresh request never produced a response
    #[error("Refresh request failed: {0}")]
    Transport(String),

    /// The refresh endpoint answered with a non-success status
    #[error("Refresh rejected: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// The refresh endpoint answered 2xx but without a usable access token
    #[error("Failed to refresh token: {0}")]
    InvalidResponse(String),

    /// New credentials could not be committed
    #[error("Failed to store refreshed credentials: {0}")]
    Storage(String),
}

/// Errors returned to callers of the authenticated request pipeline
#[derive(Error, Debug)]
pub enum ApiError {
    /// Unrecoverable authentication failure; the session has been cleared
    #[error("{message} (status {status})")]
    Auth {
        status: u16,
        message: String,
        data: Option<Value>,
    },

    /// Transport-level failure, re-raised unchanged
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Credential store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Build the structured authentication error handed to callers
    pub fn auth(status: u16, message: impl Into<String>, data: Option<Value>) -> Self {
        ApiError::Auth {
            status,
            message: message.into(),
            data,
        }
    }

    /// HTTP-like status of the failure, when one is known
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status,
            _ => None,
        }
    }

    /// Human-readable message without the status decoration
    pub fn message(&self) -> String {
        match self {
            ApiError::Auth { message, .. } => message.clone(),
            ApiError::Transport(e) => e.message.clone(),
            other => other.to_string(),
        }
    }

    /// Response payload attached to the failure, if any
    pub fn data(&self) -> Option<&Value> {
        match self {
            ApiError::Auth { data, .. } => data.as_ref(),
            ApiError::Transport(e) => e.data.as_ref(),
            _ => None,
        }
    }

    /// True when the failure signals that the session is gone
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth { .. })
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ApiError>;
