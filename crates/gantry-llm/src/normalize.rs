//! Request normalization.
//!
//! Runs once per call, on a clone of the caller's request, before provider
//! dispatch:
//!
//! 1. Drop `tool_choice` when the model supports none of the requested kinds
//! 2. Compute the output budget: `min(model cap, 8192 × 2^retry)`
//! 3. Gate reasoning — model support, no forced tool choice, and never
//!    injected into an in-progress tool chain that ran without it
//! 4. Size the reasoning budget (2000, or the `ultrathink` bump to half the
//!    output budget capped at 31999) and widen the output budget to fit it
//! 5. Strip reasoning blocks when reasoning ends up disabled
//! 6. Prune cache points from every layer the model cannot cache

use gantry_core::content::{extract_text, ContentBlock};
use gantry_core::messages::{ChatMessage, Role};
use gantry_core::models::{CacheLayer, ModelCapabilities};

use crate::types::ConverseRequest;

/// Base output token budget; doubles per max-tokens retry.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8_192;

/// Default reasoning budget.
pub const DEFAULT_REASONING_BUDGET: u32 = 2_000;

/// Hard cap on the `ultrathink` reasoning budget.
pub const ULTRATHINK_BUDGET_CAP: u32 = 31_999;

/// Keyword that bumps the reasoning budget (case-insensitive substring of
/// the last user text).
pub const ULTRATHINK_KEYWORD: &str = "ultrathink";

/// Reasoning configuration attached to a normalized request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReasoningConfig {
    /// Reasoning token budget.
    pub budget_tokens: u32,
    /// Set the interleaved-thinking beta flag.
    pub interleaved: bool,
}

/// A request ready for provider dispatch.
#[derive(Clone, Debug)]
pub struct NormalizedRequest {
    /// The normalized request body.
    pub request: ConverseRequest,
    /// Effective output token budget.
    pub max_tokens: u32,
    /// Reasoning configuration, when enabled.
    pub reasoning: Option<ReasoningConfig>,
    /// The reasoning budget when the non-default (`ultrathink`) budget was
    /// chosen; surfaced to observers.
    pub ultra_budget: Option<u32>,
}

/// Normalize a request for the given model.
#[must_use]
pub fn normalize_request(
    caps: &ModelCapabilities,
    request: &ConverseRequest,
    max_tokens_retry_count: u32,
) -> NormalizedRequest {
    let mut request = request.clone();

    // 1. Tool choice the model cannot honor is dropped, not errored.
    if let Some(config) = request.tool_config.as_mut() {
        if let Some(choice) = &config.tool_choice {
            if !caps.supports_tool_choice(choice.kind()) {
                config.tool_choice = None;
            }
        }
    }

    // 2. Output budget with escalation.
    let base = request
        .inference
        .max_tokens
        .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS);
    let escalated = base.saturating_mul(1u32 << max_tokens_retry_count.min(16));
    let mut max_tokens = escalated.min(caps.max_output_tokens);

    // 3. Reasoning gating.
    let tool_choice_set = request
        .tool_config
        .as_ref()
        .is_some_and(|c| c.tool_choice.is_some());
    let reasoning_enabled =
        caps.reasoning && !tool_choice_set && !mid_tool_chain_without_reasoning(&request.messages);

    // 4. Budget sizing.
    let mut reasoning = None;
    let mut ultra_budget = None;
    if reasoning_enabled {
        let budget = if last_user_text_requests_ultrathink(&request.messages) {
            let bumped = (max_tokens / 2).min(ULTRATHINK_BUDGET_CAP);
            ultra_budget = Some(bumped);
            bumped
        } else {
            DEFAULT_REASONING_BUDGET
        };
        max_tokens = max_tokens.max((budget.saturating_mul(2)).min(caps.max_output_tokens));
        reasoning = Some(ReasoningConfig {
            budget_tokens: budget,
            interleaved: caps.interleaved_thinking,
        });
    } else {
        // 5. No reasoning on this call: the outbound request carries none.
        for message in &mut request.messages {
            message.content.retain(|block| !block.is_reasoning());
        }
    }

    // 6. Cache points only where the model can cache.
    if !caps.supports_cache(CacheLayer::System) {
        for block in &mut request.system {
            block.cache_point = false;
        }
    }
    if !caps.supports_cache(CacheLayer::Tool) {
        if let Some(config) = request.tool_config.as_mut() {
            config.cache_point = false;
        }
    }
    if !caps.supports_cache(CacheLayer::Message) {
        for message in &mut request.messages {
            message.content.retain(|block| !block.is_cache_point());
        }
    }

    NormalizedRequest {
        request,
        max_tokens,
        reasoning,
        ultra_budget,
    }
}

/// True when the second-to-last message is a tool use that ran without a
/// reasoning block before it — injecting reasoning mid-chain would break
/// the provider's expectations for the in-flight tool conversation.
fn mid_tool_chain_without_reasoning(messages: &[ChatMessage]) -> bool {
    let Some(message) = messages.len().checked_sub(2).map(|i| &messages[i]) else {
        return false;
    };
    for block in &message.content {
        match block {
            ContentBlock::Reasoning { .. } => return false,
            ContentBlock::ToolUse { .. } => return true,
            _ => {}
        }
    }
    false
}

/// True when the last user-role message's text contains the `ultrathink`
/// keyword (case-insensitive).
fn last_user_text_requests_ultrathink(messages: &[ChatMessage]) -> bool {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| extract_text(&m.content).to_lowercase())
        .is_some_and(|text| text.contains(ULTRATHINK_KEYWORD))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
