//! Transport-level error types.

use l2index_core::IndexerError;
use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur during an RPC transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Connection refused, reset or dropped mid-request.
    #[error("Connection error: {0}")]
    Connection(String),

    /// HTTP 429; caller should back off.
    #[error("Rate limit exceeded (provider: {provider})")]
    RateLimited { provider: String },

    /// Non-success HTTP status other than 429.
    #[error("HTTP {status} from {provider}: {body}")]
    Http {
        status: u16,
        provider: String,
        body: String,
    },

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Body was not a JSON-RPC response.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// `result` did not have the expected shape.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("Invalid block range {from}..={to}: {reason}")]
    InvalidRange { from: u64, to: u64, reason: String },

    /// Every endpoint failed after its retries.
    #[error("All {endpoints} endpoints unavailable (last error: {last_error})")]
    Unavailable { endpoints: usize, last_error: String },

    /// Shutdown was requested while waiting to retry.
    #[error("Request cancelled by shutdown")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is retryable (transient).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. }
            | Self::Connection(_)
            | Self::RateLimited { .. }
            | Self::MalformedResponse(_) => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Rpc(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns `true` if the request itself is at fault, so every endpoint
    /// would reject it the same way. Anything else is the endpoint's problem
    /// and is worth trying elsewhere.
    pub fn is_request_error(&self) -> bool {
        match self {
            Self::InvalidRange { .. } | Self::Deserialization(_) => true,
            Self::Rpc(e) => !e.is_transient(),
            _ => false,
        }
    }
}

impl From<TransportError> for IndexerError {
    fn from(err: TransportError) -> Self {
        match err {
            e @ (TransportError::Unavailable { .. } | TransportError::Cancelled) => {
                IndexerError::TransientUnavailable(e.to_string())
            }
            e if e.is_retryable() => IndexerError::TransientUnavailable(e.to_string()),
            e => IndexerError::Rpc(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> TransportError {
        TransportError::Http {
            status,
            provider: "https://rpc.example".into(),
            body: String::new(),
        }
    }

    #[test]
    fn classification() {
        assert!(TransportError::Timeout { ms: 30_000 }.is_retryable());
        assert!(TransportError::Connection("reset by peer".into()).is_retryable());
        assert!(TransportError::RateLimited { provider: "a".into() }.is_retryable());
        assert!(TransportError::MalformedResponse("<html>".into()).is_retryable());
        assert!(http(502).is_retryable());
        assert!(!http(401).is_retryable());
        assert!(!TransportError::InvalidRange {
            from: 2,
            to: 1,
            reason: "inverted".into()
        }
        .is_retryable());
    }

    #[test]
    fn request_errors_are_not_endpoint_errors() {
        assert!(TransportError::InvalidRange {
            from: 2,
            to: 1,
            reason: "inverted".into()
        }
        .is_request_error());
        assert!(!http(401).is_request_error());
        assert!(!http(404).is_request_error());
        assert!(!TransportError::Cancelled.is_retryable());
        assert!(matches!(
            IndexerError::from(TransportError::Cancelled),
            IndexerError::TransientUnavailable(_)
        ));
    }

    #[test]
    fn into_indexer_error() {
        let unavailable = TransportError::Unavailable {
            endpoints: 2,
            last_error: "timeout".into(),
        };
        assert!(matches!(
            IndexerError::from(unavailable),
            IndexerError::TransientUnavailable(_)
        ));
        assert!(matches!(IndexerError::from(http(400)), IndexerError::Rpc(_)));
    }
}
