//! Model capability registry.
//!
//! Candidate models are addressed by their Bedrock model id; the registry
//! answers what each model can do (output cap, reasoning, tool-choice kinds,
//! cachable layers, regional inference profiles) and how its id maps onto
//! the Anthropic API.

use serde::{Deserialize, Serialize};

/// Tool-choice kinds a model may accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoiceKind {
    /// Model decides whether to call a tool.
    Auto,
    /// Model must call some tool.
    Any,
    /// Model must call one named tool.
    Tool,
}

/// Request layers that can carry cache points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheLayer {
    /// System prompt blocks.
    System,
    /// Tool catalog.
    Tool,
    /// Message list.
    Message,
}

/// Cross-region inference profile: a routing prefix on the model id that
/// selects which fleet serves the call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriProfile {
    /// Global routing.
    Global,
    /// United States.
    Us,
    /// Europe.
    Eu,
    /// Asia-Pacific.
    Apac,
    /// Japan.
    Jp,
    /// Australia.
    Au,
}

impl CriProfile {
    /// The id prefix for this profile.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Us => "us",
            Self::Eu => "eu",
            Self::Apac => "apac",
            Self::Jp => "jp",
            Self::Au => "au",
        }
    }

    /// Parse a profile name (as found in configuration).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "global" => Some(Self::Global),
            "us" => Some(Self::Us),
            "eu" => Some(Self::Eu),
            "apac" => Some(Self::Apac),
            "jp" => Some(Self::Jp),
            "au" => Some(Self::Au),
            _ => None,
        }
    }
}

/// What a model supports.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelCapabilities {
    /// Bedrock model id (without CRI prefix).
    pub model_id: &'static str,
    /// Hard output token cap.
    pub max_output_tokens: u32,
    /// Extended reasoning support.
    pub reasoning: bool,
    /// Interleaved-thinking beta support.
    pub interleaved_thinking: bool,
    /// Accepted tool-choice kinds.
    pub tool_choice: &'static [ToolChoiceKind],
    /// Layers that accept cache points.
    pub cache: &'static [CacheLayer],
    /// Regional inference profiles this model is served under.
    pub cri_profiles: &'static [CriProfile],
}

impl ModelCapabilities {
    /// Whether the given tool-choice kind is accepted.
    #[must_use]
    pub fn supports_tool_choice(&self, kind: ToolChoiceKind) -> bool {
        self.tool_choice.contains(&kind)
    }

    /// Whether the given layer is cachable.
    #[must_use]
    pub fn supports_cache(&self, layer: CacheLayer) -> bool {
        self.cache.contains(&layer)
    }

    /// Whether the given CRI profile serves this model.
    #[must_use]
    pub fn supports_cri_profile(&self, profile: CriProfile) -> bool {
        self.cri_profiles.contains(&profile)
    }
}

/// Well-known model ids.
pub mod model_ids {
    /// Claude Sonnet 4.5.
    pub const CLAUDE_SONNET_4_5: &str = "anthropic.claude-sonnet-4-5-20250929-v1:0";
    /// Claude Opus 4.5.
    pub const CLAUDE_OPUS_4_5: &str = "anthropic.claude-opus-4-5-20251101-v1:0";
    /// Claude Opus 4.1.
    pub const CLAUDE_OPUS_4_1: &str = "anthropic.claude-opus-4-1-20250805-v1:0";
    /// Claude Sonnet 4.
    pub const CLAUDE_SONNET_4: &str = "anthropic.claude-sonnet-4-20250514-v1:0";
    /// Claude Haiku 4.5.
    pub const CLAUDE_HAIKU_4_5: &str = "anthropic.claude-haiku-4-5-20251001-v1:0";
    /// Claude 3.7 Sonnet.
    pub const CLAUDE_3_7_SONNET: &str = "anthropic.claude-3-7-sonnet-20250219-v1:0";
    /// Claude 3.5 Haiku.
    pub const CLAUDE_3_5_HAIKU: &str = "anthropic.claude-3-5-haiku-20241022-v1:0";
}

const ALL_TOOL_CHOICES: &[ToolChoiceKind] = &[
    ToolChoiceKind::Auto,
    ToolChoiceKind::Any,
    ToolChoiceKind::Tool,
];
const ALL_CACHE_LAYERS: &[CacheLayer] = &[CacheLayer::System, CacheLayer::Tool, CacheLayer::Message];
const ALL_PROFILES: &[CriProfile] = &[
    CriProfile::Global,
    CriProfile::Us,
    CriProfile::Eu,
    CriProfile::Apac,
    CriProfile::Jp,
    CriProfile::Au,
];
const US_ONLY: &[CriProfile] = &[CriProfile::Us];

static REGISTRY: &[ModelCapabilities] = &[
    ModelCapabilities {
        model_id: model_ids::CLAUDE_SONNET_4_5,
        max_output_tokens: 64_000,
        reasoning: true,
        interleaved_thinking: true,
        tool_choice: ALL_TOOL_CHOICES,
        cache: ALL_CACHE_LAYERS,
        cri_profiles: ALL_PROFILES,
    },
    ModelCapabilities {
        model_id: model_ids::CLAUDE_OPUS_4_5,
        max_output_tokens: 64_000,
        reasoning: true,
        interleaved_thinking: true,
        tool_choice: ALL_TOOL_CHOICES,
        cache: ALL_CACHE_LAYERS,
        cri_profiles: ALL_PROFILES,
    },
    ModelCapabilities {
        model_id: model_ids::CLAUDE_OPUS_4_1,
        max_output_tokens: 32_000,
        reasoning: true,
        interleaved_thinking: true,
        tool_choice: ALL_TOOL_CHOICES,
        cache: ALL_CACHE_LAYERS,
        cri_profiles: US_ONLY,
    },
    ModelCapabilities {
        model_id: model_ids::CLAUDE_SONNET_4,
        max_output_tokens: 64_000,
        reasoning: true,
        interleaved_thinking: true,
        tool_choice: ALL_TOOL_CHOICES,
        cache: ALL_CACHE_LAYERS,
        cri_profiles: ALL_PROFILES,
    },
    ModelCapabilities {
        model_id: model_ids::CLAUDE_HAIKU_4_5,
        max_output_tokens: 64_000,
        reasoning: true,
        interleaved_thinking: false,
        tool_choice: ALL_TOOL_CHOICES,
        cache: ALL_CACHE_LAYERS,
        cri_profiles: ALL_PROFILES,
    },
    ModelCapabilities {
        model_id: model_ids::CLAUDE_3_7_SONNET,
        max_output_tokens: 64_000,
        reasoning: true,
        interleaved_thinking: false,
        tool_choice: ALL_TOOL_CHOICES,
        cache: ALL_CACHE_LAYERS,
        cri_profiles: US_ONLY,
    },
    ModelCapabilities {
        model_id: model_ids::CLAUDE_3_5_HAIKU,
        max_output_tokens: 8_192,
        reasoning: false,
        interleaved_thinking: false,
        tool_choice: ALL_TOOL_CHOICES,
        cache: ALL_CACHE_LAYERS,
        cri_profiles: US_ONLY,
    },
];

/// Anthropic API model ids, keyed by Bedrock id.
static ANTHROPIC_IDS: &[(&str, &str)] = &[
    (model_ids::CLAUDE_SONNET_4_5, "claude-sonnet-4-5-20250929"),
    (model_ids::CLAUDE_OPUS_4_5, "claude-opus-4-5-20251101"),
    (model_ids::CLAUDE_OPUS_4_1, "claude-opus-4-1-20250805"),
    (model_ids::CLAUDE_SONNET_4, "claude-sonnet-4-20250514"),
    (model_ids::CLAUDE_HAIKU_4_5, "claude-haiku-4-5-20251001"),
    (model_ids::CLAUDE_3_7_SONNET, "claude-3-7-sonnet-20250219"),
    (model_ids::CLAUDE_3_5_HAIKU, "claude-3-5-haiku-20241022"),
];

/// Strip a CRI routing prefix from a model id, if present.
#[must_use]
pub fn strip_cri_prefix(model_id: &str) -> &str {
    for profile in ALL_PROFILES {
        let prefix = profile.prefix();
        if model_id.len() > prefix.len() + 1
            && model_id.starts_with(prefix)
            && model_id.as_bytes()[prefix.len()] == b'.'
            && model_id[prefix.len() + 1..].starts_with("anthropic.")
        {
            return &model_id[prefix.len() + 1..];
        }
    }
    model_id
}

/// Look up capabilities by model id (CRI prefix tolerated).
#[must_use]
pub fn capabilities(model_id: &str) -> Option<&'static ModelCapabilities> {
    let bare = strip_cri_prefix(model_id);
    REGISTRY.iter().find(|m| m.model_id == bare)
}

/// Map a Bedrock model id to its Anthropic API id (CRI prefix tolerated).
#[must_use]
pub fn anthropic_model_id(model_id: &str) -> Option<&'static str> {
    let bare = strip_cri_prefix(model_id);
    ANTHROPIC_IDS
        .iter()
        .find(|(bedrock, _)| *bedrock == bare)
        .map(|(_, anthropic)| *anthropic)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
