//! Error types
//!
//! Transport failures and domain failures are kept in separate enums so the
//! retry loop can decide what to retry by matching on variants, and
//! `ExtractError` is what the extraction pipeline hands back to its caller.

use std::time::Duration;
use thiserror::Error;

/// Failures raised by the SSE JSON-RPC transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Remote answered 503 or could not be reached at all
    #[error("Server unavailable: {0}")]
    ServerUnavailable(String),

    /// Remote answered 401
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// No response arrived within the per-call timeout
    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// A frame or body could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Any other non-success HTTP status
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// The event stream violated the session protocol (no endpoint, early EOF)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Socket-level failure talking to the remote
    #[error("Connection error: {0}")]
    Connection(String),

    /// The call's cancellation token fired
    #[error("Call cancelled")]
    Cancelled,
}

impl TransportError {
    /// Map a non-success HTTP status onto the transport taxonomy
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            503 => TransportError::ServerUnavailable(format!("remote returned 503: {body}")),
            401 => TransportError::AuthenticationFailed,
            _ => TransportError::Http {
                status,
                message: body.to_string(),
            },
        }
    }

    /// Classify a reqwest failure, reporting timeouts against `timeout`,
    /// the limit the client was built with
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return TransportError::Timeout(timeout);
        }
        err.into()
    }

    /// Whether the retry loop may try again after this error
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TransportError::AuthenticationFailed | TransportError::Cancelled
        )
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // No limit to report here; see `from_reqwest`
        if err.is_timeout() {
            return TransportError::Connection(format!("request timed out: {err}"));
        }
        if err.is_connect() {
            return TransportError::ServerUnavailable(err.to_string());
        }
        if let Some(status) = err.status() {
            return TransportError::from_status(status.as_u16(), &err.to_string());
        }
        TransportError::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::InvalidResponse(err.to_string())
    }
}

/// Failures in caller-supplied input; never retried
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid design URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Errors surfaced by `ProgressiveExtractor::extract`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// `max_wait_time` ran out under the `fail` timeout strategy
    #[error("Extraction exceeded its {}ms budget", .0.as_millis())]
    DeadlineExceeded(Duration),
}

impl From<ExtractError> for String {
    fn from(err: ExtractError) -> String {
        err.to_string()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            TransportError::from_status(503, "busy"),
            TransportError::ServerUnavailable(_)
        ));
        assert_eq!(
            TransportError::from_status(401, ""),
            TransportError::AuthenticationFailed
        );
        assert_eq!(
            TransportError::from_status(418, "teapot"),
            TransportError::Http {
                status: 418,
                message: "teapot".to_string()
            }
        );
    }

    #[test]
    fn test_retryable() {
        assert!(TransportError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(TransportError::ServerUnavailable("x".into()).is_retryable());
        assert!(TransportError::Protocol("no endpoint".into()).is_retryable());
        assert!(!TransportError::AuthenticationFailed.is_retryable());
        assert!(!TransportError::Cancelled.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ExtractError::from(TransportError::Timeout(Duration::from_millis(1500)));
        assert_eq!(err.to_string(), "Timed out after 1500ms");

        let msg: String = ExtractError::DeadlineExceeded(Duration::from_secs(5)).into();
        assert_eq!(msg, "Extraction exceeded its 5000ms budget");
    }

    #[tokio::test]
    async fn test_reqwest_timeout_reports_the_limit() {
        // Accepted by the kernel but never answered
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let limit = Duration::from_millis(50);
        let client = reqwest::Client::builder().timeout(limit).build().unwrap();

        let err = client.get(&url).send().await.unwrap_err();
        assert!(err.is_timeout());
        let classified = TransportError::from_reqwest(err, limit);
        assert_eq!(classified, TransportError::Timeout(limit));
        assert_eq!(classified.to_string(), "Timed out after 50ms");

        let err = client.get(&url).send().await.unwrap_err();
        match TransportError::from(err) {
            TransportError::Connection(message) => assert!(message.contains("timed out")),
            other => panic!("unexpected classification: {other:?}"),
        }
        drop(listener);
    }
}
