//! LLM layer errors.

/// Failure of an LLM invocation.
///
/// `Throttled` and `MaxTokensExceeded` are the two retryable conditions the
/// turn loop's retry wrapper understands; everything else aborts the turn.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Provider backpressure. The account index has already advanced when
    /// this surfaces from the client.
    #[error("throttled by provider: {message}")]
    Throttled {
        /// Provider-supplied detail.
        message: String,
    },
    /// Sentinel for the output-cap condition. Raised by the turn loop when a
    /// response stops with `max_tokens`; each retry doubles the budget.
    #[error("model hit the output token cap")]
    MaxTokensExceeded,
    /// Non-retryable provider failure.
    #[error("provider error ({status}): {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Provider-supplied detail.
        message: String,
    },
    /// Transport failure.
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    /// Malformed provider payload.
    #[error("invalid provider payload: {0}")]
    Json(#[from] serde_json::Error),
    /// The model id is not in the capability registry.
    #[error("unknown model: {0}")]
    UnknownModel(String),
    /// No candidate models were supplied.
    #[error("no candidate models")]
    NoCandidates,
    /// Credentials could not be produced for an account.
    #[error("credentials unavailable for account {account}: {message}")]
    Credentials {
        /// Account id.
        account: String,
        /// Detail.
        message: String,
    },
}

impl LlmError {
    /// Whether the retry wrapper should retry this failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled { .. } | Self::MaxTokensExceeded)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttled_is_retryable() {
        assert!(LlmError::Throttled {
            message: "429".into()
        }
        .is_retryable());
        assert!(LlmError::MaxTokensExceeded.is_retryable());
    }

    #[test]
    fn api_errors_are_not_retryable() {
        assert!(!LlmError::Api {
            status: 400,
            message: "bad request".into()
        }
        .is_retryable());
        assert!(!LlmError::UnknownModel("x".into()).is_retryable());
    }
}
