//! Backend and transport error types
//!
//! Every failure reported by the Time & Material backend or by the HTTP
//! transport ends up here. Messages shown to users come from
//! [`BackendError::user_message`], which prefers the message the backend put
//! in the response body.
//!
//! # Examples
//!
//! ```rust
//! use estimator::errors::BackendError;
//!
//! let err = BackendError::Status {
//!     status: 409,
//!     message: Some("Step already exists".to_string()),
//! };
//! assert_eq!(err.user_message(), "Step already exists");
//!
//! let err = BackendError::Status { status: 502, message: None };
//! assert_eq!(err.user_message(), estimator::errors::GENERIC_FAILURE_MESSAGE);
//! ```

use thiserror::Error;

/// Shown when the backend did not explain why a request failed.
pub const GENERIC_FAILURE_MESSAGE: &str = "Request failed, please try again";

/// Errors raised while talking to the backend
#[derive(Error, Debug)]
pub enum BackendError {
    /// Non-success HTTP status, with the message extracted from the body if any
    #[error("Backend returned status {status}: {}", .message.as_deref().unwrap_or(GENERIC_FAILURE_MESSAGE))]
    Status {
        /// HTTP status code
        status: u16,
        /// Message from the response body's `error` field
        message: Option<String>,
    },

    /// Successful status but the body reported a failure
    #[error("Backend rejected the request: {0}")]
    Rejected(String),

    /// Connection, TLS or protocol failure
    #[error("Request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Body could not be decoded or failed boundary validation
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    /// Backend could not be reached for a reason other than transport
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Create an invalid response error
    pub fn invalid(reason: impl Into<String>) -> Self {
        BackendError::InvalidResponse(reason.into())
    }

    /// HTTP status reported by the backend, if the request got that far
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            BackendError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if the backend reported the addressed entity as missing
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Human-readable message, taken from the backend when it provided one
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Status {
                message: Some(message),
                ..
            } => message.clone(),
            BackendError::Rejected(message) => message.clone(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}
