//! Content block types.
//!
//! Every message body is an ordered list of [`ContentBlock`]s. The sum is
//! closed: providers, the message log, and the context manager all agree on
//! exactly these kinds. Cache points travel inline as markers so that the
//! normalization layer can prune them per model capability.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome status of a tool execution, carried on the result block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolResultStatus {
    /// Tool ran to completion.
    Success,
    /// Tool raised an error; the content holds the error text.
    Error,
}

/// Content nested inside a `toolResult` block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolResultBlock {
    /// Text output.
    #[serde(rename = "text")]
    Text {
        /// The text.
        text: String,
    },
    /// Image output (base64-encoded).
    #[serde(rename = "image")]
    Image {
        /// Base64-encoded image data.
        data: String,
        /// MIME type (e.g. `image/png`).
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// A single content block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Plain text.
    #[serde(rename = "text")]
    Text {
        /// The text.
        text: String,
    },
    /// Image content (base64-encoded).
    #[serde(rename = "image")]
    Image {
        /// Base64-encoded image data.
        data: String,
        /// MIME type (e.g. `image/png`).
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// A tool invocation requested by the model.
    #[serde(rename = "toolUse")]
    ToolUse {
        /// Unique tool use ID.
        id: String,
        /// Tool name.
        name: String,
        /// Tool input (JSON object).
        input: Map<String, Value>,
    },
    /// The result of a tool invocation.
    #[serde(rename = "toolResult")]
    ToolResult {
        /// ID of the tool use this result answers.
        #[serde(rename = "toolUseId")]
        tool_use_id: String,
        /// Result content parts.
        content: Vec<ToolResultBlock>,
        /// Execution status.
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<ToolResultStatus>,
    },
    /// Model reasoning (extended thinking).
    #[serde(rename = "reasoning")]
    Reasoning {
        /// The reasoning text.
        text: String,
        /// Verification signature.
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Prompt-cache checkpoint marker. Carries no content; providers that
    /// support message-level caching translate it, others see it pruned.
    #[serde(rename = "cachePoint")]
    CachePoint,
}

// ─────────────────────────────────────────────────────────────────────────────
// Constructors and predicates
// ─────────────────────────────────────────────────────────────────────────────

impl ContentBlock {
    /// Create a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an image block.
    #[must_use]
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Create a tool use block.
    #[must_use]
    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: Map<String, Value>,
    ) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Create a tool result block with a single text part.
    #[must_use]
    pub fn tool_result_text(
        tool_use_id: impl Into<String>,
        text: impl Into<String>,
        status: ToolResultStatus,
    ) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: vec![ToolResultBlock::Text { text: text.into() }],
            status: Some(status),
        }
    }

    /// Create a reasoning block.
    #[must_use]
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning {
            text: text.into(),
            signature: None,
        }
    }

    /// Returns `true` if this is a text block.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    /// Returns `true` if this is a tool use block.
    #[must_use]
    pub fn is_tool_use(&self) -> bool {
        matches!(self, Self::ToolUse { .. })
    }

    /// Returns `true` if this is a tool result block.
    #[must_use]
    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::ToolResult { .. })
    }

    /// Returns `true` if this is a reasoning block.
    #[must_use]
    pub fn is_reasoning(&self) -> bool {
        matches!(self, Self::Reasoning { .. })
    }

    /// Returns `true` if this is a cache point marker.
    #[must_use]
    pub fn is_cache_point(&self) -> bool {
        matches!(self, Self::CachePoint)
    }

    /// Returns the text if this is a text block, `None` otherwise.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

impl ToolResultBlock {
    /// Create a text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an image part.
    #[must_use]
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extraction helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Concatenate the text of all text blocks, newline-joined.
#[must_use]
pub fn extract_text(content: &[ContentBlock]) -> String {
    content
        .iter()
        .filter_map(ContentBlock::as_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collect references to all tool use blocks, in order.
pub fn extract_tool_uses(content: &[ContentBlock]) -> Vec<&ContentBlock> {
    content.iter().filter(|b| b.is_tool_use()).collect()
}

/// The text of the first reasoning block, if any.
#[must_use]
pub fn extract_reasoning_text(content: &[ContentBlock]) -> Option<&str> {
    content.iter().find_map(|b| match b {
        ContentBlock::Reasoning { text, .. } => Some(text.as_str()),
        _ => None,
    })
}

/// Concatenate the text parts of tool result content, newline-joined.
#[must_use]
pub fn extract_tool_result_text(content: &[ToolResultBlock]) -> String {
    content
        .iter()
        .filter_map(|c| match c {
            ToolResultBlock::Text { text } => Some(text.as_str()),
            ToolResultBlock::Image { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- serde wire shape --

    #[test]
    fn text_block_serde() {
        let b = ContentBlock::text("hello");
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json, json!({"type": "text", "text": "hello"}));
        let back: ContentBlock = serde_json::from_value(json).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn image_block_serde() {
        let b = ContentBlock::image("base64data", "image/png");
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(
            json,
            json!({"type": "image", "data": "base64data", "mimeType": "image/png"})
        );
    }

    #[test]
    fn tool_use_block_serde() {
        let mut input = Map::new();
        let _ = input.insert("cmd".into(), json!("ls"));
        let b = ContentBlock::tool_use("t1", "commandExecution", input);
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["type"], "toolUse");
        assert_eq!(json["id"], "t1");
        assert_eq!(json["input"]["cmd"], "ls");
        let back: ContentBlock = serde_json::from_value(json).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn tool_result_block_serde() {
        let b = ContentBlock::tool_result_text("t1", "a.txt", ToolResultStatus::Success);
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["type"], "toolResult");
        assert_eq!(json["toolUseId"], "t1");
        assert_eq!(json["status"], "success");
        assert_eq!(json["content"][0]["text"], "a.txt");
    }

    #[test]
    fn reasoning_block_without_signature() {
        let b = ContentBlock::reasoning("thinking...");
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json, json!({"type": "reasoning", "text": "thinking..."}));
    }

    #[test]
    fn cache_point_serde() {
        let b = ContentBlock::CachePoint;
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json, json!({"type": "cachePoint"}));
        let back: ContentBlock = serde_json::from_value(json).unwrap();
        assert!(back.is_cache_point());
    }

    // -- predicates --

    #[test]
    fn predicates_discriminate() {
        assert!(ContentBlock::text("x").is_text());
        assert!(!ContentBlock::text("x").is_tool_use());
        assert!(ContentBlock::tool_use("t", "n", Map::new()).is_tool_use());
        assert!(ContentBlock::reasoning("r").is_reasoning());
        assert!(
            ContentBlock::tool_result_text("t", "ok", ToolResultStatus::Success).is_tool_result()
        );
    }

    #[test]
    fn as_text_only_for_text_blocks() {
        assert_eq!(ContentBlock::text("hi").as_text(), Some("hi"));
        assert_eq!(ContentBlock::reasoning("r").as_text(), None);
    }

    // -- extraction --

    #[test]
    fn extract_text_joins_text_blocks() {
        let content = vec![
            ContentBlock::text("first"),
            ContentBlock::tool_use("t1", "x", Map::new()),
            ContentBlock::text("second"),
        ];
        assert_eq!(extract_text(&content), "first\nsecond");
    }

    #[test]
    fn extract_text_empty() {
        assert_eq!(extract_text(&[]), "");
    }

    #[test]
    fn extract_tool_uses_preserves_order() {
        let content = vec![
            ContentBlock::text("x"),
            ContentBlock::tool_use("t1", "a", Map::new()),
            ContentBlock::tool_use("t2", "b", Map::new()),
        ];
        let uses = extract_tool_uses(&content);
        assert_eq!(uses.len(), 2);
        assert!(matches!(uses[0], ContentBlock::ToolUse { id, .. } if id == "t1"));
    }

    #[test]
    fn extract_reasoning_text_first_wins() {
        let content = vec![
            ContentBlock::reasoning("first"),
            ContentBlock::reasoning("second"),
        ];
        assert_eq!(extract_reasoning_text(&content), Some("first"));
        assert_eq!(extract_reasoning_text(&[ContentBlock::text("x")]), None);
    }

    #[test]
    fn extract_tool_result_text_skips_images() {
        let content = vec![
            ToolResultBlock::text("line1"),
            ToolResultBlock::image("d", "image/png"),
            ToolResultBlock::text("line2"),
        ];
        assert_eq!(extract_tool_result_text(&content), "line1\nline2");
    }
}
