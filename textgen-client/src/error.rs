//! Error taxonomy for generation calls.
//!
//! The pipeline only ever asks two questions of a failed call: can the run
//! continue with the next batch (`is_recoverable`), and was the request
//! rejected for bad credentials (`is_auth`). Everything else is detail for
//! the error message.

/// Failure of a single generation call.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// Credentials rejected by the provider.
    #[error("invalid credentials (HTTP {status})")]
    Auth { status: u16 },

    /// Provider asked us to slow down.
    #[error("rate limited by provider")]
    RateLimited,

    /// Connection-level failure before any response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// Provider answered with a non-success status.
    #[error("backend returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Response body did not match the provider's documented shape.
    #[error("malformed backend response: {0}")]
    InvalidResponse(String),

    /// The hard per-call deadline expired.
    #[error("call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The cancellation token fired mid-call.
    #[error("call cancelled")]
    Cancelled,
}

impl GenerateError {
    /// Whether the pipeline may proceed to the next batch after this failure.
    ///
    /// Rate limits, network blips, upstream hiccups, malformed output, and
    /// timeouts are scoped to one batch. Credential failures and explicit
    /// cancellation are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GenerateError::RateLimited
                | GenerateError::Network(_)
                | GenerateError::Upstream { .. }
                | GenerateError::InvalidResponse(_)
                | GenerateError::Timeout { .. }
        )
    }

    /// Whether this is a credential rejection.
    pub fn is_auth(&self) -> bool {
        matches!(self, GenerateError::Auth { .. })
    }

    /// Whether the backend could not be reached at all.
    pub fn is_network(&self) -> bool {
        matches!(self, GenerateError::Network(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenerateError::Cancelled)
    }

    /// Map a transport error from reqwest into the taxonomy.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() {
            GenerateError::Network(format!("connection failed: {}", err))
        } else if err.is_timeout() {
            GenerateError::Network(format!("request timed out: {}", err))
        } else {
            GenerateError::Network(err.to_string())
        }
    }

    /// Map a non-success HTTP status into the taxonomy.
    pub(crate) fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => GenerateError::Auth { status },
            429 => GenerateError::RateLimited,
            _ => GenerateError::Upstream { status, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_splits_recoverable_from_fatal() {
        assert!(GenerateError::RateLimited.is_recoverable());
        assert!(GenerateError::Timeout { seconds: 120 }.is_recoverable());
        assert!(GenerateError::Network("refused".into()).is_recoverable());
        assert!(GenerateError::InvalidResponse("no text".into()).is_recoverable());

        assert!(!GenerateError::Auth { status: 401 }.is_recoverable());
        assert!(!GenerateError::Cancelled.is_recoverable());
    }

    #[test]
    fn status_mapping() {
        assert!(GenerateError::from_status(401, String::new()).is_auth());
        assert!(GenerateError::from_status(403, String::new()).is_auth());
        assert!(matches!(
            GenerateError::from_status(429, String::new()),
            GenerateError::RateLimited
        ));
        assert!(matches!(
            GenerateError::from_status(500, "overloaded".into()),
            GenerateError::Upstream { status: 500, .. }
        ));
    }
}
