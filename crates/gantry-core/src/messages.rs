//! Conversation messages and log items.
//!
//! [`MessageItem`] is the persisted shape: one row of a session's
//! append-only conversation log, with the incremental billed-token count
//! attributed to it. [`ChatMessage`] is the in-flight projection sent to an
//! LLM provider.

use serde::{Deserialize, Serialize};

use crate::content::ContentBlock;

/// Message author role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The user (also carries tool results back to the model).
    User,
    /// The assistant.
    Assistant,
}

/// Discriminates the four kinds of log items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    /// A message typed by the user.
    UserMessage,
    /// A finalized assistant reply.
    AssistantResponse,
    /// An assistant message that requested tool invocations.
    ToolUse,
    /// The results answering a `ToolUse` item.
    ToolResult,
}

/// Why the model stopped generating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of response.
    EndTurn,
    /// The model wants to use a tool.
    ToolUse,
    /// Hit the output token cap.
    MaxTokens,
    /// Hit a stop sequence.
    StopSequence,
}

/// Token usage reported by a provider for one call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Uncached input tokens billed.
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
    /// Tokens read from the prompt cache.
    pub cache_read_input_tokens: u64,
    /// Tokens written to the prompt cache.
    pub cache_write_input_tokens: u64,
}

impl TokenUsage {
    /// Total input-side tokens the provider processed for the call — the
    /// figure that per-item token attribution reconciles against.
    #[must_use]
    pub fn billed_input(&self) -> u64 {
        self.input_tokens + self.cache_read_input_tokens + self.cache_write_input_tokens
    }
}

/// One persisted item of a session's conversation log.
///
/// Items are append-only; only `token_count` is ever rewritten, when the
/// billed-token delta from the next LLM response is attributed back to the
/// last user-role item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageItem {
    /// Monotonic sort key, assigned on append. Empty until persisted.
    #[serde(skip)]
    pub sk: String,
    /// Author role.
    pub role: Role,
    /// Item kind.
    pub message_type: MessageKind,
    /// Ordered content blocks.
    pub content: Vec<ContentBlock>,
    /// Incremental input tokens attributed to this item. May be negative on
    /// the user item at a turn boundary where prior reasoning blocks were
    /// dropped.
    pub token_count: i64,
    /// Per-message model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_override: Option<String>,
    /// Reasoning budget in effect when this item was produced (only recorded
    /// for the non-default budget).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
    /// Creation time, epoch milliseconds.
    pub created_at: i64,
}

impl MessageItem {
    /// Create an item with the given role, kind, and content. Sort key is
    /// assigned by the message log on append.
    #[must_use]
    pub fn new(role: Role, message_type: MessageKind, content: Vec<ContentBlock>) -> Self {
        Self {
            sk: String::new(),
            role,
            message_type,
            content,
            token_count: 0,
            model_override: None,
            thinking_budget: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a plain-text user message item.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(
            Role::User,
            MessageKind::UserMessage,
            vec![ContentBlock::text(text)],
        )
    }

    /// Create a plain-text assistant response item.
    #[must_use]
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::new(
            Role::Assistant,
            MessageKind::AssistantResponse,
            vec![ContentBlock::text(text)],
        )
    }

    /// Returns `true` if a turn may start after this item (the loop only
    /// wakes on a fresh user message or a pending tool result).
    #[must_use]
    pub fn is_turn_trigger(&self) -> bool {
        matches!(
            self.message_type,
            MessageKind::UserMessage | MessageKind::ToolResult
        )
    }
}

/// An in-flight provider message: role plus content blocks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role.
    pub role: Role,
    /// Ordered content blocks.
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    /// Create a chat message.
    #[must_use]
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    /// Create a plain-text user message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    /// Create a plain-text assistant message.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentBlock::text(text)])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
