//! Worker errors.
//!
//! Maps onto the engine's error taxonomy: storage failures propagate (the
//! state machine cannot proceed without durable appends), provider failures
//! abort the turn with status left as `working`, and `Cancelled` is the
//! internal signal for a clean cooperative exit.

use gantry_llm::LlmError;
use gantry_store::StoreError;

/// Turn loop failure.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Durable storage failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    /// Non-retryable provider failure.
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),
    /// The model kept hitting the output cap after five budget doublings.
    #[error("output budget escalation limit reached")]
    MaxTokensEscalation,
    /// One hundred retries were not enough.
    #[error("llm retry budget exhausted")]
    RetriesExhausted,
    /// The cancellation token fired. Unwinds the turn without appending;
    /// surfaced to callers as [`crate::turn::TurnOutcome::Cancelled`].
    #[error("turn cancelled")]
    Cancelled,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_convert() {
        let err: WorkerError = StoreError::NotFound {
            pk: "sessions".into(),
            sk: "w".into(),
        }
        .into();
        assert!(matches!(err, WorkerError::Store(_)));
    }

    #[test]
    fn llm_errors_convert() {
        let err: WorkerError = LlmError::NoCandidates.into();
        assert!(matches!(err, WorkerError::Llm(_)));
    }
}
