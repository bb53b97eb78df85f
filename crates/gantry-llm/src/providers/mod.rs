//! Provider back ends.
//!
//! Both providers speak plain HTTPS and share the [`Provider`] contract:
//! take a normalized request, return the neutral response shape. Error
//! classification is shared — HTTP 429 (or an explicit throttling type in
//! the body) becomes [`LlmError::Throttled`]; everything else is terminal
//! for the call.

pub mod anthropic;
pub mod bedrock;

use async_trait::async_trait;

use gantry_core::messages::StopReason;

use crate::errors::LlmError;
use crate::normalize::NormalizedRequest;
use crate::types::ConverseResponse;

/// One LLM back end.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Issue a single call against the given model.
    async fn converse(
        &self,
        model_id: &str,
        request: &NormalizedRequest,
    ) -> Result<ConverseResponse, LlmError>;
}

/// Map an error response to the shared taxonomy.
pub(crate) fn classify_api_error(status: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.pointer("/error/message"))
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.to_owned());

    if status == 429 || body.contains("ThrottlingException") || body.contains("rate_limit_error") {
        LlmError::Throttled { message }
    } else {
        LlmError::Api { status, message }
    }
}

/// Parse a provider stop-reason string.
pub(crate) fn parse_stop_reason(raw: &str) -> StopReason {
    match raw {
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        "stop_sequence" => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    }
}

/// Bedrock image format tag for a MIME type. Unknown types fall back to PNG.
pub(crate) fn image_format(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpeg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "png",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
