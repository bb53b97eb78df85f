//! Provider-neutral request and response shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use gantry_core::content::ContentBlock;
use gantry_core::messages::{ChatMessage, StopReason, TokenUsage};

/// One system prompt block, optionally followed by a cache point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemBlock {
    /// Prompt text.
    pub text: String,
    /// Emit a cache point after this block.
    pub cache_point: bool,
}

impl SystemBlock {
    /// A cached system block (the system prompt is always followed by one
    /// cache point).
    #[must_use]
    pub fn cached(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cache_point: true,
        }
    }
}

/// How the model is allowed to choose tools.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolChoice {
    /// Model decides.
    Auto,
    /// Model must call some tool.
    Any,
    /// Model must call the named tool.
    Tool {
        /// Tool name.
        name: String,
    },
}

impl ToolChoice {
    /// The capability kind this choice requires.
    #[must_use]
    pub fn kind(&self) -> gantry_core::models::ToolChoiceKind {
        use gantry_core::models::ToolChoiceKind;
        match self {
            Self::Auto => ToolChoiceKind::Auto,
            Self::Any => ToolChoiceKind::Any,
            Self::Tool { .. } => ToolChoiceKind::Tool,
        }
    }
}

/// One tool the model may call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the input.
    pub input_schema: Value,
}

/// The tool catalog for a call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Available tools.
    pub tools: Vec<ToolSpec>,
    /// Emit a cache point after the catalog.
    pub cache_point: bool,
    /// Forced tool choice, if any.
    pub tool_choice: Option<ToolChoice>,
}

/// Sampling configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Output token budget; defaults to the escalation base when unset.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Nucleus sampling cutoff.
    pub top_p: Option<f32>,
}

/// A provider-neutral request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConverseRequest {
    /// System prompt blocks.
    pub system: Vec<SystemBlock>,
    /// Ordered conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Tool catalog; `None` when the model gets no tools (some providers
    /// reject an empty list).
    pub tool_config: Option<ToolConfig>,
    /// Sampling configuration.
    pub inference: InferenceConfig,
}

impl ConverseRequest {
    /// A bare request over the given messages.
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            system: Vec::new(),
            messages,
            tool_config: None,
            inference: InferenceConfig::default(),
        }
    }
}

/// A provider-neutral response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConverseResponse {
    /// Assistant content blocks.
    pub content: Vec<ContentBlock>,
    /// Why generation stopped.
    pub stop_reason: StopReason,
    /// Token usage for the call.
    pub usage: TokenUsage,
}

/// What [`crate::client::LlmClient::converse`] returns.
#[derive(Clone, Debug)]
pub struct ConverseResult {
    /// The provider response.
    pub response: ConverseResponse,
    /// The reasoning budget, reported only when the non-default
    /// (`ultrathink`) budget was used.
    pub thinking_budget: Option<u32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::models::ToolChoiceKind;

    #[test]
    fn tool_choice_kinds() {
        assert_eq!(ToolChoice::Auto.kind(), ToolChoiceKind::Auto);
        assert_eq!(ToolChoice::Any.kind(), ToolChoiceKind::Any);
        assert_eq!(
            ToolChoice::Tool { name: "x".into() }.kind(),
            ToolChoiceKind::Tool
        );
    }

    #[test]
    fn system_block_cached_constructor() {
        let block = SystemBlock::cached("You are an engineer.");
        assert!(block.cache_point);
        assert_eq!(block.text, "You are an engineer.");
    }

    #[test]
    fn bare_request_has_no_tools() {
        let req = ConverseRequest::new(vec![ChatMessage::user("hi")]);
        assert!(req.tool_config.is_none());
        assert!(req.system.is_empty());
        assert!(req.inference.max_tokens.is_none());
    }
}
