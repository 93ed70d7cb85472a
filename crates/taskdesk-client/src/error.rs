//! Client error types.

use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

use crate::pipeline::RefreshFailure;

/// Client-wide result type.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors surfaced to callers of the API client.
///
/// Authorization failures are resolved inside the pipeline whenever a refresh
/// is possible; only the outcomes below ever reach a facade caller.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected a request that carried no access token.
    #[error("not authenticated - login required")]
    Unauthenticated,

    /// The refresh token was missing or rejected. The credential store has
    /// already been cleared when this is returned.
    #[error("session expired - login required")]
    SessionExpired,

    /// No response was received (connection failure or deadline exceeded).
    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    /// The refresh endpoint failed without rejecting the refresh token. The
    /// session is kept. Every request waiting on the same attempt receives
    /// the same failure.
    #[error("token refresh failed, session kept: {source}")]
    RefreshUnavailable { source: Arc<RefreshFailure> },

    /// Any other non-success status, passed through unchanged.
    #[error("server returned HTTP {status}: {message}")]
    Server { status: StatusCode, message: String },

    /// A success response whose body did not have the expected shape.
    #[error("failed to decode {context} response: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The credential store could not be written or cleared.
    #[error("credential store error: {0}")]
    Store(#[from] StoreError),

    /// The request could not be built (e.g. unjoinable path).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn server(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    pub fn decode(context: &'static str, source: serde_json::Error) -> Self {
        Self::Decode { context, source }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Transport { source } => source.status(),
            Self::RefreshUnavailable { source } => match source.as_ref() {
                RefreshFailure::Server { status, .. } => Some(*status),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether this error is an authorization failure of any kind.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Unauthenticated | Self::SessionExpired => true,
            Self::Server { status, .. } => *status == StatusCode::UNAUTHORIZED,
            _ => false,
        }
    }

    /// Check if the user has to log in again before retrying.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::SessionExpired)
    }

    /// Check if this error is transient and the call may be retried later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::RefreshUnavailable { .. } => true,
            Self::Server { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// Build a [`ApiError::Server`] from a non-success response, pulling the
    /// human readable message out of the body when the server sent one.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(source) => return Self::Transport { source },
        };
        Self::server(status, error_message(status, &body))
    }
}

/// Extract the error message from a response body.
///
/// Accepts `{"message": ..}` and `{"error": ..}` JSON bodies, falls back to
/// the raw text and finally to the canonical reason phrase.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for key in ["message", "error"] {
            if let Some(message) = value.get(key).and_then(|m| m.as_str()) {
                return message.to_string();
            }
        }
    }
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}

/// Errors raised by a credential store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to persist credentials: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("refusing to store a credential record without both tokens")]
    IncompleteRecord,
}
