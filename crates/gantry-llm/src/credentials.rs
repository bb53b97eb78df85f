//! Per-account credential seam.
//!
//! The Bedrock path calls with bearer credentials minted per account; how
//! they are minted (role assumption, key exchange) is the host's business.
//! Implementations may cache short-lived tokens — expiry is tolerated
//! because the next throttle rotates accounts and re-fetches.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::LlmError;

/// Produces a bearer token for a Bedrock account.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// A bearer token valid for the given account id.
    async fn bearer_token(&self, account_id: &str) -> Result<String, LlmError>;
}

/// Fixed token table, for tests and single-account setups.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    tokens: HashMap<String, String>,
}

impl StaticCredentials {
    /// Create a provider over the given account→token pairs.
    #[must_use]
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    /// Insert one token.
    pub fn insert(&mut self, account_id: impl Into<String>, token: impl Into<String>) {
        let _ = self.tokens.insert(account_id.into(), token.into());
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentials {
    async fn bearer_token(&self, account_id: &str) -> Result<String, LlmError> {
        self.tokens
            .get(account_id)
            .cloned()
            .ok_or_else(|| LlmError::Credentials {
                account: account_id.to_owned(),
                message: "no token configured".into(),
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
