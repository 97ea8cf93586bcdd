use thiserror::Error;
use url::Url;

use crate::types::ErrorResponse;

/// Transport-level failures of the HTTP transport.
#[derive(Debug, Error, Clone)]
pub enum NetError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("HTTP {status} for URL: {url}")]
    HttpError {
        url: Url,
        status: u16,
        body: Option<String>,
    },
    #[error("Timeout")]
    Timeout,
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl NetError {
    /// Creates an HTTP error from a generic string
    pub fn http<S: Into<String>>(msg: S) -> Self {
        Self::Http(msg.into())
    }

    /// Checks if this error indicates a timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetError::Timeout)
    }

    /// Gets the HTTP status code if the server answered with one
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            NetError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response diagnostics reported to the caller of a failed load.
    ///
    /// Failures without an HTTP status are reported with code `0`.
    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        match self {
            NetError::HttpError { status, body, .. } => ErrorResponse {
                code: *status,
                text: body.clone().unwrap_or_default(),
            },
            other => ErrorResponse {
                code: 0,
                text: other.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for NetError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Timeout;
        }
        Self::Http(error.to_string())
    }
}

pub type NetResult<T> = Result<T, NetError>;
