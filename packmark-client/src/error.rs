//! Client error types

use thiserror::Error;

/// Client error type
///
/// "No match" is never an error: lookups return `Option`/empty results.
/// Only transport failures and upstream API failures surface here.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the upstream API, payload carried for diagnosis
    #[error("Upstream API error: status {status}: {payload}")]
    Api {
        status: u16,
        payload: serde_json::Value,
    },

    /// Response body did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Systemic auth failure; callers should abort rather than skip
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ClientError::Api { status: 401 | 403, .. })
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Statuses worth retrying with backoff: rate limit and transient
/// server-side failures. Everything else surfaces immediately.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_status_set() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status), "{status} should be retryable");
        }
        for status in [400, 401, 403, 404, 409, 412] {
            assert!(!is_retryable_status(status), "{status} must surface immediately");
        }
    }

    #[test]
    fn auth_failures_are_systemic() {
        let err = ClientError::Api {
            status: 401,
            payload: serde_json::Value::Null,
        };
        assert!(err.is_auth_failure());
        let err = ClientError::Api {
            status: 500,
            payload: serde_json::Value::Null,
        };
        assert!(!err.is_auth_failure());
    }
}
