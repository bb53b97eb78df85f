//! Worker configuration from the environment.

use gantry_core::models::CriProfile;
use gantry_core::secrets::{SecretError, SecretReader};
use gantry_llm::ProviderKind;

/// Default role assumed in each Bedrock account.
pub const DEFAULT_BEDROCK_ROLE: &str = "bedrock-remote-swe-role";

/// Process configuration.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Which LLM back end serves this process.
    pub provider: ProviderKind,
    /// Key-value store table name.
    pub table_name: Option<String>,
    /// Event bus HTTP endpoint.
    pub event_endpoint: Option<String>,
    /// Anthropic API key, given directly.
    pub anthropic_api_key: Option<String>,
    /// Name of the secret holding the Anthropic API key.
    pub anthropic_api_key_parameter: Option<String>,
    /// Bedrock account ids for load balancing.
    pub bedrock_accounts: Vec<String>,
    /// Role assumed in each Bedrock account.
    pub bedrock_role_name: String,
    /// Regional inference profile override.
    pub cri_region_override: Option<CriProfile>,
}

impl WorkerConfig {
    /// Read configuration from process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Read configuration through a variable lookup (testable).
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            provider: var("LLM_PROVIDER")
                .map(|v| ProviderKind::parse(&v))
                .unwrap_or(ProviderKind::Bedrock),
            table_name: var("TABLE_NAME"),
            event_endpoint: var("EVENT_HTTP_ENDPOINT"),
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            anthropic_api_key_parameter: var("ANTHROPIC_API_KEY_PARAMETER_NAME"),
            bedrock_accounts: var("BEDROCK_AWS_ACCOUNTS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
            bedrock_role_name: var("BEDROCK_AWS_ROLE_NAME")
                .unwrap_or_else(|| DEFAULT_BEDROCK_ROLE.to_owned()),
            cri_region_override: var("BEDROCK_CRI_REGION_OVERRIDE")
                .as_deref()
                .and_then(CriProfile::parse),
        }
    }

    /// The Anthropic API key: direct value first, secret reference second.
    pub async fn resolve_anthropic_api_key(
        &self,
        secrets: &dyn SecretReader,
    ) -> Result<Option<String>, SecretError> {
        if let Some(key) = &self.anthropic_api_key {
            return Ok(Some(key.clone()));
        }
        match &self.anthropic_api_key_parameter {
            Some(parameter) => Ok(Some(secrets.get(parameter).await?)),
            None => Ok(None),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
