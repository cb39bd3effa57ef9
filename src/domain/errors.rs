//! Transport error taxonomy for provider round trips.
//!
//! Every failure mode of a single provider call is classified here so the
//! router can decide between retrying in place, falling through to the next
//! provider, or giving up. None of these errors ever reach the pipeline
//! caller; exhaustion is converted into a safe non-verified result.

use thiserror::Error;

/// Errors that can occur during one HTTP round trip to a provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// TCP/TLS connection could not be established.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// The request did not complete within the provider's timeout budget.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Rate limit exceeded (HTTP 429).
    #[error("rate limited - too many requests")]
    RateLimited,

    /// Server-side failure (HTTP 5xx).
    #[error("server error ({status}): {body}")]
    ServerError {
        /// HTTP status code (500, 502, 503, 504, ...).
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The request payload exceeded the provider's limit (HTTP 413).
    #[error("payload too large - image exceeds provider limit")]
    PayloadTooLarge,

    /// The provider rejected the request as semantically invalid (HTTP 422).
    #[error("unprocessable entity: {0}")]
    Unprocessable(String),

    /// Any other failure: unexpected status code or malformed response body.
    #[error("unexpected provider response ({status}): {body}")]
    Unexpected {
        /// HTTP status code.
        status: u16,
        /// Response body or decode failure description.
        body: String,
    },
}

impl TransportError {
    /// Returns true if retrying the same provider with the same payload can
    /// plausibly succeed. Only timeouts and server errors qualify; a 429 or
    /// 413 will keep failing within the backoff budget, so the router moves
    /// on to the next provider instead.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout(_) | TransportError::ServerError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_errors() {
        assert!(TransportError::Timeout(5000).is_retriable());
        assert!(TransportError::ServerError {
            status: 500,
            body: "boom".to_string()
        }
        .is_retriable());
        assert!(TransportError::ServerError {
            status: 503,
            body: String::new()
        }
        .is_retriable());
    }

    #[test]
    fn test_non_retriable_errors() {
        assert!(!TransportError::RateLimited.is_retriable());
        assert!(!TransportError::PayloadTooLarge.is_retriable());
        assert!(!TransportError::Unprocessable("bad schema".to_string()).is_retriable());
        assert!(!TransportError::ConnectionRefused("10.0.0.1:443".to_string()).is_retriable());
        assert!(!TransportError::Unexpected {
            status: 418,
            body: String::new()
        }
        .is_retriable());
    }

    #[test]
    fn test_display_includes_status() {
        let err = TransportError::ServerError {
            status: 502,
            body: "bad gateway".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("502"));
        assert!(msg.contains("bad gateway"));
    }
}
