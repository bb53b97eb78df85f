//! Bedrock Converse back end.
//!
//! Speaks the `bedrock-runtime` Converse REST API with per-account bearer
//! credentials. The account currently selected by the shared
//! [`AccountPool`] decides which credentials are minted; rotation itself
//! happens in the client when a throttle surfaces.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use gantry_core::content::{ContentBlock, ToolResultBlock, ToolResultStatus};
use gantry_core::messages::{ChatMessage, Role, TokenUsage};

use crate::account::AccountPool;
use crate::credentials::CredentialsProvider;
use crate::errors::LlmError;
use crate::normalize::NormalizedRequest;
use crate::providers::{classify_api_error, image_format, parse_stop_reason, Provider};
use crate::types::{ConverseResponse, ToolChoice};

/// Interleaved-thinking beta tag.
const INTERLEAVED_THINKING_BETA: &str = "interleaved-thinking-2025-05-14";

/// Bedrock Converse provider.
pub struct BedrockProvider {
    client: reqwest::Client,
    region: String,
    accounts: Arc<AccountPool>,
    credentials: Arc<dyn CredentialsProvider>,
}

impl BedrockProvider {
    /// Create a provider for the given region, sharing the client-owned
    /// account pool.
    pub fn new(
        region: impl Into<String>,
        accounts: Arc<AccountPool>,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            region: region.into(),
            accounts,
            credentials,
        }
    }

    fn endpoint(&self, model_id: &str) -> String {
        // Model ids carry a ':' revision separator that must be escaped in
        // the path segment.
        let escaped = model_id.replace(':', "%3A");
        format!(
            "https://bedrock-runtime.{}.amazonaws.com/model/{}/converse",
            self.region, escaped
        )
    }
}

#[async_trait]
impl Provider for BedrockProvider {
    async fn converse(
        &self,
        model_id: &str,
        request: &NormalizedRequest,
    ) -> Result<ConverseResponse, LlmError> {
        let account = self.accounts.current().unwrap_or("default").to_owned();
        let token = self.credentials.bearer_token(&account).await?;
        let body = build_request_body(request);

        debug!(
            model = model_id,
            account = %account,
            message_count = request.request.messages.len(),
            max_tokens = request.max_tokens,
            reasoning = request.reasoning.is_some(),
            "bedrock converse"
        );

        let response = self
            .client
            .post(self.endpoint(model_id))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

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

/// Build the Converse request body.
#[must_use]
pub fn build_request_body(request: &NormalizedRequest) -> Value {
    let mut body = Map::new();
    let _ = body.insert(
        "messages".into(),
        Value::Array(
            request
                .request
                .messages
                .iter()
                .map(message_to_bedrock)
                .collect(),
        ),
    );

    if !request.request.system.is_empty() {
        let mut system = Vec::new();
        for block in &request.request.system {
            system.push(json!({ "text": block.text }));
            if block.cache_point {
                system.push(json!({ "cachePoint": { "type": "default" } }));
            }
        }
        let _ = body.insert("system".into(), Value::Array(system));
    }

    if let Some(config) = &request.request.tool_config {
        let mut tools: Vec<Value> = config
            .tools
            .iter()
            .map(|t| {
                json!({
                    "toolSpec": {
                        "name": t.name,
                        "description": t.description,
                        "inputSchema": { "json": t.input_schema },
                    }
                })
            })
            .collect();
        if config.cache_point {
            tools.push(json!({ "cachePoint": { "type": "default" } }));
        }
        let mut tool_config = Map::new();
        let _ = tool_config.insert("tools".into(), Value::Array(tools));
        if let Some(choice) = &config.tool_choice {
            let _ = tool_config.insert(
                "toolChoice".into(),
                match choice {
                    ToolChoice::Auto => json!({ "auto": {} }),
                    ToolChoice::Any => json!({ "any": {} }),
                    ToolChoice::Tool { name } => json!({ "tool": { "name": name } }),
                },
            );
        }
        let _ = body.insert("toolConfig".into(), Value::Object(tool_config));
    }

    let mut inference = Map::new();
    let _ = inference.insert("maxTokens".into(), Value::from(request.max_tokens));
    if let Some(temperature) = request.request.inference.temperature {
        let _ = inference.insert("temperature".into(), Value::from(temperature));
    }
    if let Some(top_p) = request.request.inference.top_p {
        let _ = inference.insert("topP".into(), Value::from(top_p));
    }
    let _ = body.insert("inferenceConfig".into(), Value::Object(inference));

    if let Some(reasoning) = &request.reasoning {
        let mut extra = Map::new();
        let _ = extra.insert(
            "reasoning_config".into(),
            json!({ "type": "enabled", "budget_tokens": reasoning.budget_tokens }),
        );
        if reasoning.interleaved {
            let _ = extra.insert("anthropic_beta".into(), json!([INTERLEAVED_THINKING_BETA]));
        }
        let _ = body.insert("additionalModelRequestFields".into(), Value::Object(extra));
    }

    Value::Object(body)
}

fn message_to_bedrock(message: &ChatMessage) -> Value {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    let content: Vec<Value> = message.content.iter().map(block_to_bedrock).collect();
    json!({ "role": role, "content": content })
}

fn block_to_bedrock(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({ "text": text }),
        ContentBlock::Image { data, mime_type } => json!({
            "image": {
                "format": image_format(mime_type),
                "source": { "bytes": data },
            }
        }),
        ContentBlock::ToolUse { id, name, input } => json!({
            "toolUse": { "toolUseId": id, "name": name, "input": input }
        }),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            status,
        } => {
            let parts: Vec<Value> = content
                .iter()
                .map(|part| match part {
                    ToolResultBlock::Text { text } => json!({ "text": text }),
                    ToolResultBlock::Image { data, mime_type } => json!({
                        "image": {
                            "format": image_format(mime_type),
                            "source": { "bytes": data },
                        }
                    }),
                })
                .collect();
            let mut result = Map::new();
            let _ = result.insert("toolUseId".into(), Value::String(tool_use_id.clone()));
            let _ = result.insert("content".into(), Value::Array(parts));
            if let Some(status) = status {
                let tag = match status {
                    ToolResultStatus::Success => "success",
                    ToolResultStatus::Error => "error",
                };
                let _ = result.insert("status".into(), Value::String(tag.into()));
            }
            json!({ "toolResult": Value::Object(result) })
        }
        ContentBlock::Reasoning { text, signature } => json!({
            "reasoningContent": {
                "reasoningText": { "text": text, "signature": signature }
            }
        }),
        ContentBlock::CachePoint => json!({ "cachePoint": { "type": "default" } }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parse a Converse response body into the neutral shape.
pub fn parse_response_body(payload: &Value) -> Result<ConverseResponse, LlmError> {
    let content_blocks = payload
        .pointer("/output/message/content")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut content = Vec::with_capacity(content_blocks.len());
    for block in &content_blocks {
        if let Some(converted) = bedrock_block_to_content(block) {
            content.push(converted);
        }
    }

    let stop_reason = payload
        .get("stopReason")
        .and_then(Value::as_str)
        .map(parse_stop_reason)
        .unwrap_or(gantry_core::messages::StopReason::EndTurn);

    let usage = TokenUsage {
        input_tokens: read_u64(payload, "/usage/inputTokens"),
        output_tokens: read_u64(payload, "/usage/outputTokens"),
        cache_read_input_tokens: read_u64(payload, "/usage/cacheReadInputTokens"),
        cache_write_input_tokens: read_u64(payload, "/usage/cacheWriteInputTokens"),
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

fn bedrock_block_to_content(block: &Value) -> Option<ContentBlock> {
    if let Some(text) = block.get("text").and_then(Value::as_str) {
        return Some(ContentBlock::text(text));
    }
    if let Some(tool_use) = block.get("toolUse") {
        return Some(ContentBlock::ToolUse {
            id: tool_use.get("toolUseId")?.as_str()?.to_owned(),
            name: tool_use.get("name")?.as_str()?.to_owned(),
            input: tool_use
                .get("input")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        });
    }
    if let Some(reasoning) = block.pointer("/reasoningContent/reasoningText") {
        return Some(ContentBlock::Reasoning {
            text: reasoning
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            signature: reasoning
                .get("signature")
                .and_then(Value::as_str)
                .map(str::to_owned),
        });
    }
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
