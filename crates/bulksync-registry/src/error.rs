//! Error types for the registry client.

use std::time::Duration;

use reqwest::StatusCode;

/// A failed registry page fetch.
///
/// The fetcher never retries; the cycle that issued the call decides what to
/// do with the error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The call did not complete within the per-call budget.
    #[error("registry fetch timed out after {0:?}")]
    Timeout(Duration),

    /// Credentials were rejected.
    #[error("registry rejected credentials (HTTP {0})")]
    Unauthorized(u16),

    /// Any other non-success status.
    #[error("registry returned HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The page body could not be decoded.
    #[error("malformed registry response: {0}")]
    Malformed(String),

    /// Connection-level failure.
    #[error("registry transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// Classifies a non-success HTTP response.
    pub fn from_status(status: StatusCode, body: impl Into<String>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized(status.as_u16()),
            _ => Self::UnexpectedStatus {
                status: status.as_u16(),
                body: body.into(),
            },
        }
    }

    /// Short label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Unauthorized(_) => "unauthorized",
            Self::UnexpectedStatus { .. } => "unexpected_status",
            Self::Malformed(_) => "malformed",
            Self::Transport(_) => "transport",
        }
    }
}

/// Errors constructing the registry client.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid registry base URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl RegistryError {
    #[must_use]
    pub fn invalid_base_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidBaseUrl {
            url: url.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            FetchError::from_status(StatusCode::UNAUTHORIZED, ""),
            FetchError::Unauthorized(401)
        );
        assert_eq!(
            FetchError::from_status(StatusCode::FORBIDDEN, ""),
            FetchError::Unauthorized(403)
        );
        assert!(matches!(
            FetchError::from_status(StatusCode::BAD_GATEWAY, "upstream"),
            FetchError::UnexpectedStatus { status: 502, .. }
        ));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(FetchError::Timeout(Duration::from_secs(1)).kind(), "timeout");
        assert_eq!(FetchError::Malformed("x".into()).kind(), "malformed");
    }
}
