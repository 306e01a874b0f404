//! Error types for Tributary.
//!
//! Transient upstream failures (network errors, upstream 429s) are handled
//! inside the retrying fetcher and only surface wrapped in
//! [`TributaryError::ExhaustedRetries`]. Everything else propagates unchanged
//! to the HTTP boundary, where it is translated into a status code.

use thiserror::Error;

/// Result type alias using `TributaryError`.
pub type Result<T> = std::result::Result<T, TributaryError>;

/// A failure worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransientError {
    /// Upstream answered 429 Too Many Requests.
    #[error("upstream rate limited the request: {body}")]
    UpstreamRateLimited {
        /// Response body, if any
        body: String,
    },

    /// Connection refused, DNS failure, timeout, truncated body.
    #[error("network error: {0}")]
    Network(String),
}

/// Main error type for all Tributary operations.
#[derive(Debug, Error)]
pub enum TributaryError {
    // ═══════════════════════════════════════════════════════════════════════════
    // UPSTREAM ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Upstream rejected the request with a non-retryable status.
    #[error("upstream returned HTTP {status}: {body}")]
    UpstreamHttp {
        /// HTTP status returned by the upstream
        status: u16,
        /// Response body
        body: String,
    },

    /// Every attempt failed transiently.
    #[error("upstream unavailable after {attempts} attempts: {last_error}")]
    ExhaustedRetries {
        /// Total attempts made, including the first
        attempts: u32,
        /// Failure observed on the final attempt
        last_error: TransientError,
    },

    /// Upstream answered successfully but the expected data is absent.
    #[error("{resource} not found: {identifier}")]
    NotFound {
        /// Resource kind ("weather", "news", "stocks")
        resource: String,
        /// Caller-supplied identifier (location, query, symbol)
        identifier: String,
    },

    /// Upstream body could not be decoded at all.
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // ORCHESTRATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// One of the sub-fetches of a joint fetch failed.
    #[error("error aggregating data from multiple APIs: {cause}")]
    Aggregate {
        /// First failure encountered
        cause: Box<TributaryError>,
    },

    /// Caller exceeded the local admission budget.
    #[error("rate limit exceeded, try again later")]
    LocalRateLimitExceeded,

    // ═══════════════════════════════════════════════════════════════════════════
    // INPUT & SETUP ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Input validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(String),
}

impl TributaryError {
    /// Wraps a sub-fetch failure as a joint-fetch failure.
    pub fn aggregate(cause: TributaryError) -> Self {
        TributaryError::Aggregate {
            cause: Box::new(cause),
        }
    }

    /// Builds a `NotFound` for a resource and identifier.
    pub fn not_found(resource: impl Into<String>, identifier: impl Into<String>) -> Self {
        TributaryError::NotFound {
            resource: resource.into(),
            identifier: identifier.into(),
        }
    }

    /// Returns the innermost error, unwrapping `Aggregate` layers.
    pub fn root_cause(&self) -> &TributaryError {
        match self {
            TributaryError::Aggregate { cause } => cause.root_cause(),
            other => other,
        }
    }

    /// Returns true if the caller is at fault (bad input or over budget).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.root_cause(),
            TributaryError::Validation(_) | TributaryError::LocalRateLimitExceeded
        )
    }

    /// Returns true if the failure originated at an upstream service.
    pub fn is_upstream_error(&self) -> bool {
        matches!(
            self.root_cause(),
            TributaryError::UpstreamHttp { .. }
                | TributaryError::ExhaustedRetries { .. }
                | TributaryError::NotFound { .. }
                | TributaryError::InvalidResponse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_error_display() {
        let err = TributaryError::UpstreamHttp {
            status: 503,
            body: "maintenance".into(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("maintenance"));

        let err = TributaryError::not_found("stocks", "ZZZZ");
        assert_eq!(err.to_string(), "stocks not found: ZZZZ");
    }

    #[test]
    fn test_exhausted_retries_keeps_last_error() {
        let err = TributaryError::ExhaustedRetries {
            attempts: 4,
            last_error: TransientError::UpstreamRateLimited { body: "slow down".into() },
        };
        let msg = err.to_string();
        assert!(msg.contains("4 attempts"));
        assert!(msg.contains("slow down"));
    }

    #[test]
    fn test_root_cause_unwraps_nested_aggregate() {
        let inner = TributaryError::not_found("news", "rust");
        let err = TributaryError::aggregate(TributaryError::aggregate(inner));
        assert!(matches!(err.root_cause(), TributaryError::NotFound { .. }));
    }

    #[test_case(TributaryError::LocalRateLimitExceeded, true, false ; "local rate limit")]
    #[test_case(TributaryError::Validation("x".into()), true, false ; "validation")]
    #[test_case(TributaryError::UpstreamHttp { status: 500, body: String::new() }, false, true ; "upstream http")]
    #[test_case(TributaryError::InvalidResponse("x".into()), false, true ; "invalid response")]
    #[test_case(TributaryError::aggregate(TributaryError::not_found("weather", "x")), false, true ; "aggregate of not found")]
    #[test_case(TributaryError::Config("x".into()), false, false ; "config")]
    fn test_error_classification(err: TributaryError, client: bool, upstream: bool) {
        assert_eq!(err.is_client_error(), client);
        assert_eq!(err.is_upstream_error(), upstream);
    }
}
