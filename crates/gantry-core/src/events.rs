//! Progress events fanned out to session observers.
//!
//! The engine publishes one event per tool invocation (use + result), an
//! optional title update, and the final assistant message, in that order.
//! Delivery is an external concern behind [`EventPublisher`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::messages::Role;

/// An event published on the session's fan-out bus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentEvent {
    /// The model requested a tool invocation.
    #[serde(rename = "toolUse", rename_all = "camelCase")]
    ToolUse {
        /// Tool name.
        tool_name: String,
        /// Tool use ID.
        tool_use_id: String,
        /// Stringified JSON input.
        input: String,
        /// Non-default reasoning budget in effect, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        thinking_budget: Option<u32>,
        /// Reasoning text preceding the tool call, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning_text: Option<String>,
    },
    /// A tool finished.
    #[serde(rename = "toolResult", rename_all = "camelCase")]
    ToolResult {
        /// Tool name.
        tool_name: String,
        /// Tool use ID.
        tool_use_id: String,
        /// Rendered output text.
        output: String,
    },
    /// The session title changed.
    #[serde(rename = "sessionTitleUpdate", rename_all = "camelCase")]
    SessionTitleUpdate {
        /// The new title.
        new_title: String,
    },
    /// A chat message became visible (final replies, progress echoes,
    /// system notices).
    #[serde(rename = "message")]
    Message {
        /// Author role.
        role: Role,
        /// Message text.
        text: String,
    },
}

impl AgentEvent {
    /// Short event kind tag, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolUse { .. } => "toolUse",
            Self::ToolResult { .. } => "toolResult",
            Self::SessionTitleUpdate { .. } => "sessionTitleUpdate",
            Self::Message { .. } => "message",
        }
    }
}

/// Publication failure.
#[derive(Debug, thiserror::Error)]
#[error("event publish failed: {0}")]
pub struct EventError(pub String);

/// Fan-out seam. Implementations deliver to whatever transport observers
/// subscribed over; the engine treats delivery as best-effort.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event for the given session.
    async fn publish(&self, worker_id: &str, event: AgentEvent) -> Result<(), EventError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_use_event_serde() {
        let ev = AgentEvent::ToolUse {
            tool_name: "commandExecution".into(),
            tool_use_id: "t1".into(),
            input: "{\"cmd\":\"ls\"}".into(),
            thinking_budget: None,
            reasoning_text: None,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "toolUse");
        assert_eq!(json["toolName"], "commandExecution");
        assert_eq!(json["toolUseId"], "t1");
        assert!(json.get("thinkingBudget").is_none());
    }

    #[test]
    fn tool_use_event_with_budget() {
        let ev = AgentEvent::ToolUse {
            tool_name: "x".into(),
            tool_use_id: "t1".into(),
            input: "{}".into(),
            thinking_budget: Some(31_999),
            reasoning_text: Some("thinking".into()),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["thinkingBudget"], 31_999);
        assert_eq!(json["reasoningText"], "thinking");
    }

    #[test]
    fn tool_result_event_serde() {
        let ev = AgentEvent::ToolResult {
            tool_name: "commandExecution".into(),
            tool_use_id: "t1".into(),
            output: "a.txt".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "toolResult");
        assert_eq!(json["output"], "a.txt");
    }

    #[test]
    fn title_update_event_serde() {
        let ev = AgentEvent::SessionTitleUpdate {
            new_title: "Fix CI".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(
            json,
            json!({"type": "sessionTitleUpdate", "newTitle": "Fix CI"})
        );
    }

    #[test]
    fn message_event_serde() {
        let ev = AgentEvent::Message {
            role: Role::Assistant,
            text: "Hi.".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json, json!({"type": "message", "role": "assistant", "text": "Hi."}));
    }

    #[test]
    fn kind_tags() {
        assert_eq!(
            AgentEvent::SessionTitleUpdate {
                new_title: String::new()
            }
            .kind(),
            "sessionTitleUpdate"
        );
    }

    #[test]
    fn event_roundtrip() {
        let ev = AgentEvent::Message {
            role: Role::User,
            text: "hello".into(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        let back: AgentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev, back);
    }
}
