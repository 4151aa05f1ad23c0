//! Accrual client error types.

/// Errors that can occur when querying the accrual service.
#[derive(Debug, thiserror::Error)]
pub enum AccrualError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered 200 but the body is not a valid accrual reply.
    #[error("cannot decode accrual response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The service answered with a status the client has no mapping for.
    #[error("accrual service returned HTTP {status}")]
    UnexpectedStatus {
        /// The offending HTTP status code.
        status: u16,
    },
}

impl AccrualError {
    /// Whether another attempt against the service could succeed.
    ///
    /// Transport failures and 5xx responses are transient; a malformed body
    /// means the service is reachable but broken, so retrying the same
    /// request is pointless.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Decode(_) => false,
            Self::UnexpectedStatus { status } => *status >= 500,
        }
    }

    /// Whether this is a decode failure, as opposed to an unreachable service.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
