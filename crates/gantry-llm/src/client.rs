//! The provider-agnostic `converse` entry point.
//!
//! One call does: uniform candidate-model choice → CRI profile selection
//! (Bedrock) → capability-driven normalization → provider dispatch →
//! throttle-driven account rotation → best-effort ledger tracking → result
//! with the non-default reasoning budget surfaced.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use gantry_core::models::{capabilities, CriProfile};
use gantry_store::TokenLedger;

use crate::account::AccountPool;
use crate::credentials::CredentialsProvider;
use crate::errors::LlmError;
use crate::normalize::normalize_request;
use crate::providers::{anthropic::AnthropicProvider, bedrock::BedrockProvider, Provider};
use crate::types::{ConverseRequest, ConverseResult};

/// Which back end serves this process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// Bedrock Converse.
    Bedrock,
    /// Anthropic Messages.
    Anthropic,
}

impl ProviderKind {
    /// Parse the `LLM_PROVIDER` setting. Unknown values fall back to
    /// Bedrock, the default.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("anthropic") {
            Self::Anthropic
        } else {
            Self::Bedrock
        }
    }
}

/// Default CRI profile set used when no override is configured.
const DEFAULT_CRI_PROFILES: &[CriProfile] = &[CriProfile::Us];

/// The LLM client.
pub struct LlmClient {
    kind: ProviderKind,
    provider: Arc<dyn Provider>,
    accounts: Arc<AccountPool>,
    cri_override: Option<CriProfile>,
    ledger: Option<TokenLedger>,
}

impl LlmClient {
    /// Build a Bedrock-backed client.
    pub fn bedrock(
        region: impl Into<String>,
        accounts: Vec<String>,
        credentials: Arc<dyn CredentialsProvider>,
        cri_override: Option<CriProfile>,
    ) -> Self {
        let accounts = Arc::new(AccountPool::new(accounts));
        let provider = Arc::new(BedrockProvider::new(
            region,
            accounts.clone(),
            credentials,
        ));
        Self {
            kind: ProviderKind::Bedrock,
            provider,
            accounts,
            cri_override,
            ledger: None,
        }
    }

    /// Build an Anthropic-backed client.
    pub fn anthropic(api_key: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::Anthropic,
            provider: Arc::new(AnthropicProvider::new(api_key)),
            accounts: Arc::new(AccountPool::new(Vec::new())),
            cri_override: None,
            ledger: None,
        }
    }

    /// Build a client over an injected provider (tests, custom back ends).
    pub fn with_provider(kind: ProviderKind, provider: Arc<dyn Provider>) -> Self {
        Self {
            kind,
            provider,
            accounts: Arc::new(AccountPool::new(Vec::new())),
            cri_override: None,
            ledger: None,
        }
    }

    /// Replace the account pool (tests).
    #[must_use]
    pub fn with_accounts(mut self, accounts: Vec<String>) -> Self {
        self.accounts = Arc::new(AccountPool::new(accounts));
        self
    }

    /// Track usage into the given ledger.
    #[must_use]
    pub fn with_ledger(mut self, ledger: TokenLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// The shared account pool.
    #[must_use]
    pub fn accounts(&self) -> &Arc<AccountPool> {
        &self.accounts
    }

    /// Issue one provider call.
    ///
    /// `max_tokens_retry_count` doubles the output budget per prior
    /// max-tokens failure. A throttle advances the account index and
    /// resurfaces as [`LlmError::Throttled`] for the caller's retry loop.
    pub async fn converse(
        &self,
        worker_id: &str,
        candidate_models: &[String],
        request: &ConverseRequest,
        max_tokens_retry_count: u32,
    ) -> Result<ConverseResult, LlmError> {
        // 1. Uniform candidate choice.
        if candidate_models.is_empty() {
            return Err(LlmError::NoCandidates);
        }
        let chosen = &candidate_models[rand::thread_rng().gen_range(0..candidate_models.len())];
        let caps = capabilities(chosen).ok_or_else(|| LlmError::UnknownModel(chosen.clone()))?;

        // 2. Regional profile (Bedrock only).
        let model_id = if self.kind == ProviderKind::Bedrock {
            let profile_set: &[CriProfile] = match &self.cri_override {
                Some(profile) => std::slice::from_ref(profile),
                None => DEFAULT_CRI_PROFILES,
            };
            let profile = profile_set[rand::thread_rng().gen_range(0..profile_set.len())];
            if caps.supports_cri_profile(profile) {
                format!("{}.{}", profile.prefix(), caps.model_id)
            } else {
                caps.model_id.to_owned()
            }
        } else {
            caps.model_id.to_owned()
        };

        // 3. Normalization.
        let normalized = normalize_request(caps, request, max_tokens_retry_count);
        debug!(
            model = %model_id,
            max_tokens = normalized.max_tokens,
            reasoning = normalized.reasoning.is_some(),
            "converse"
        );

        // 4-5. Call; rotate on throttle and rethrow.
        let response = match self.provider.converse(&model_id, &normalized).await {
            Ok(response) => response,
            Err(LlmError::Throttled { message }) => {
                let next = self.accounts.advance();
                warn!(
                    next_account_index = next,
                    accounts = self.accounts.len(),
                    %message,
                    "provider throttled, rotating account"
                );
                return Err(LlmError::Throttled { message });
            }
            Err(other) => return Err(other),
        };

        // 6. Ledger tracking, best-effort.
        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger
                .add_usage(worker_id, caps.model_id, &response.usage)
                .await
            {
                warn!(error = %e, "token ledger write failed");
            }
        }

        // 7. Surface the budget only when the ultra budget was in play.
        Ok(ConverseResult {
            response,
            thinking_budget: normalized.ultra_budget,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
