//! Anthropic Messages back end.
//!
//! Maps Bedrock-style model ids onto the Anthropic API via a fixed table,
//! converts blocks both ways (images to base64 sources, tool use/result,
//! reasoning to `thinking`), expresses cache points as `ephemeral`
//! `cache_control` markers on the preceding block, and reads usage from the
//! API's native counters.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use gantry_core::content::{ContentBlock, ToolResultBlock, ToolResultStatus};
use gantry_core::messages::{ChatMessage, Role, TokenUsage};
use gantry_core::models::anthropic_model_id;

use crate::errors::LlmError;
use crate::normalize::NormalizedRequest;
use crate::providers::{classify_api_error, parse_stop_reason, Provider};
use crate::types::{ConverseResponse, ToolChoice};

/// API endpoint.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// API version header value.
const API_VERSION: &str = "2023-06-01";

/// Interleaved-thinking beta tag.
const INTERLEAVED_THINKING_BETA: &str = "interleaved-thinking-2025-05-14";

/// Anthropic Messages provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    /// Create a provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
        }
    }

    /// Override the base URL (tests, proxies).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn converse(
        &self,
        model_id: &str,
        request: &NormalizedRequest,
    ) -> Result<ConverseResponse, LlmError> {
        let body = build_request_body(model_id, request)?;

        debug!(
            model = model_id,
            message_count = request.request.messages.len(),
            max_tokens = request.max_tokens,
            reasoning = request.reasoning.is_some(),
            "anthropic converse"
        );

        let mut http = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION);
        if request.reasoning.is_some_and(|r| r.interleaved) {
            http = http.header("anthropic-beta", INTERLEAVED_THINKING_BETA);
        }

        let response = http.json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status.as_u16(), &text));
        }

        let payload: Value = response.json().await?;
        parse_response_body(&payload)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request building
// ─────────────────────────────────────────────────────────────────────────────

/// Build the Messages API request body.
pub fn build_request_body(
    model_id: &str,
    request: &NormalizedRequest,
) -> Result<Value, LlmError> {
    let model = anthropic_model_id(model_id)
        .ok_or_else(|| LlmError::UnknownModel(model_id.to_owned()))?;

    let mut body = Map::new();
    let _ = body.insert("model".into(), Value::String(model.to_owned()));
    let _ = body.insert("max_tokens".into(), Value::from(request.max_tokens));
    let _ = body.insert(
        "messages".into(),
        Value::Array(
            request
                .request
                .messages
                .iter()
                .map(message_to_anthropic)
                .collect(),
        ),
    );

    if !request.request.system.is_empty() {
        let system: Vec<Value> = request
            .request
            .system
            .iter()
            .map(|block| {
                let mut b = Map::new();
                let _ = b.insert("type".into(), json!("text"));
                let _ = b.insert("text".into(), json!(block.text));
                if block.cache_point {
                    let _ = b.insert("cache_control".into(), json!({ "type": "ephemeral" }));
                }
                Value::Object(b)
            })
            .collect();
        let _ = body.insert("system".into(), Value::Array(system));
    }

    if let Some(config) = &request.request.tool_config {
        let mut tools: Vec<Value> = config
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.input_schema,
                })
            })
            .collect();
        if config.cache_point {
            if let Some(Value::Object(last)) = tools.last_mut() {
                let _ = last.insert("cache_control".into(), json!({ "type": "ephemeral" }));
            }
        }
        let _ = body.insert("tools".into(), Value::Array(tools));
        if let Some(choice) = &config.tool_choice {
            let _ = body.insert(
                "tool_choice".into(),
                match choice {
                    ToolChoice::Auto => json!({ "type": "auto" }),
                    ToolChoice::Any => json!({ "type": "any" }),
                    ToolChoice::Tool { name } => json!({ "type": "tool", "name": name }),
                },
            );
        }
    }

    if let Some(reasoning) = &request.reasoning {
        let _ = body.insert(
            "thinking".into(),
            json!({ "type": "enabled", "budget_tokens": reasoning.budget_tokens }),
        );
    }
    if let Some(temperature) = request.request.inference.temperature {
        let _ = body.insert("temperature".into(), Value::from(temperature));
    }
    if let Some(top_p) = request.request.inference.top_p {
        let _ = body.insert("top_p".into(), Value::from(top_p));
    }

    Ok(Value::Object(body))
}

fn message_to_anthropic(message: &ChatMessage) -> Value {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    let mut content: Vec<Value> = Vec::with_capacity(message.content.len());
    for block in &message.content {
        match block {
            // A cache point marks the prefix boundary: it becomes a
            // cache_control marker on the block before it.
            ContentBlock::CachePoint => {
                if let Some(Value::Object(previous)) = content.last_mut() {
                    let _ =
                        previous.insert("cache_control".into(), json!({ "type": "ephemeral" }));
                }
            }
            other => content.push(block_to_anthropic(other)),
        }
    }
    json!({ "role": role, "content": content })
}

fn block_to_anthropic(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({ "type": "text", "text": text }),
        ContentBlock::Image { data, mime_type } => image_to_anthropic(data, mime_type),
        ContentBlock::ToolUse { id, name, input } => json!({
            "type": "tool_use", "id": id, "name": name, "input": input
        }),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            status,
        } => {
            let parts: Vec<Value> = content
                .iter()
                .map(|part| match part {
                    ToolResultBlock::Text { text } => json!({ "type": "text", "text": text }),
                    ToolResultBlock::Image { data, mime_type } => {
                        image_to_anthropic(data, mime_type)
                    }
                })
                .collect();
            let mut result = Map::new();
            let _ = result.insert("type".into(), json!("tool_result"));
            let _ = result.insert("tool_use_id".into(), json!(tool_use_id));
            let _ = result.insert("content".into(), Value::Array(parts));
            if *status == Some(ToolResultStatus::Error) {
                let _ = result.insert("is_error".into(), Value::Bool(true));
            }
            Value::Object(result)
        }
        ContentBlock::Reasoning { text, signature } => {
            let mut thinking = Map::new();
            let _ = thinking.insert("type".into(), json!("thinking"));
            let _ = thinking.insert("thinking".into(), json!(text));
            if let Some(signature) = signature {
                let _ = thinking.insert("signature".into(), json!(signature));
            }
            Value::Object(thinking)
        }
        // Handled by the caller; unreachable here but total anyway.
        ContentBlock::CachePoint => Value::Null,
    }
}

fn image_to_anthropic(data: &str, mime_type: &str) -> Value {
    let media_type = if mime_type.is_empty() {
        "image/png"
    } else {
        mime_type
    };
    json!({
        "type": "image",
        "source": { "type": "base64", "media_type": media_type, "data": data }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Response parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parse a Messages API response body into the neutral shape.
pub fn parse_response_body(payload: &Value) -> Result<ConverseResponse, LlmError> {
    let blocks = payload
        .get("content")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut content = Vec::with_capacity(blocks.len());
    for block in &blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    content.push(ContentBlock::text(text));
                }
            }
            Some("tool_use") => {
                content.push(ContentBlock::ToolUse {
                    id: block
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_owned(),
                    name: block
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_owned(),
                    input: block
                        .get("input")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default(),
                });
            }
            Some("thinking") => {
                content.push(ContentBlock::Reasoning {
                    text: block
                        .get("thinking")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_owned(),
                    signature: block
                        .get("signature")
                        .and_then(Value::as_str)
                        .map(str::to_owned),
                });
            }
            _ => {}
        }
    }

    let stop_reason = payload
        .get("stop_reason")
        .and_then(Value::as_str)
        .map(parse_stop_reason)
        .unwrap_or(gantry_core::messages::StopReason::EndTurn);

    let usage = TokenUsage {
        input_tokens: read_u64(payload, "/usage/input_tokens"),
        output_tokens: read_u64(payload, "/usage/output_tokens"),
        cache_read_input_tokens: read_u64(payload, "/usage/cache_read_input_tokens"),
        cache_write_input_tokens: read_u64(payload, "/usage/cache_creation_input_tokens"),
    };

    Ok(ConverseResponse {
        content,
        stop_reason,
        usage,
    })
}

fn read_u64(payload: &Value, pointer: &str) -> u64 {
    payload.pointer(pointer).and_then(Value::as_u64).unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
