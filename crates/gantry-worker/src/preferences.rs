//! Process-wide preferences.
//!
//! Default model candidates, the common prompt suffix shared by every
//! session, and custom-agent definitions (name, system prompt, allowed
//! tools, MCP server configuration).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use gantry_core::models::model_ids;

/// System prompt used when no custom agent is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an autonomous software engineering agent working in an isolated \
environment. You complete coding tasks end to end: explore the repository, \
make changes, run commands to verify them, and report progress as you go. \
Use the reportProgress tool to keep the user informed, and maintain your \
plan with the todo tools. Be concise in your replies.";

/// A named agent definition selectable per session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomAgent {
    /// Display name.
    pub name: String,
    /// System prompt replacing the default.
    pub system_prompt: String,
    /// Built-in tool names this agent may use (the required set is always
    /// added on top).
    #[serde(default)]
    pub tools: Vec<String>,
    /// MCP server configuration handed to the router.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp_servers: Option<Value>,
}

/// Process-wide preferences.
#[derive(Clone, Debug)]
pub struct Preferences {
    /// Candidate models for regular turns.
    pub default_models: Vec<String>,
    /// Cheap model used for title generation.
    pub title_model: String,
    /// Suffix appended to every system prompt under `## Common Prompt`.
    pub common_prompt: Option<String>,
    /// Custom agents by id.
    pub custom_agents: HashMap<String, CustomAgent>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_models: vec![model_ids::CLAUDE_SONNET_4_5.to_owned()],
            title_model: model_ids::CLAUDE_3_5_HAIKU.to_owned(),
            common_prompt: None,
            custom_agents: HashMap::new(),
        }
    }
}

impl Preferences {
    /// Look up a custom agent by id.
    #[must_use]
    pub fn custom_agent(&self, id: Option<&str>) -> Option<&CustomAgent> {
        id.and_then(|id| self.custom_agents.get(id))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
