//! Session title generation.
//!
//! One cheap-model call per session, once a transcript exists. Best-effort
//! all the way: any failure leaves the session untitled and is only
//! logged.

use gantry_core::content::extract_text;
use gantry_core::messages::ChatMessage;
use gantry_llm::types::{ConverseRequest, InferenceConfig, SystemBlock};
use gantry_llm::{LlmClient, LlmError};

/// Display budget for generated titles.
pub const TITLE_MAX_CHARS: usize = 15;

const TITLE_PROMPT: &str = "\
Summarize the following conversation as a session title of at most 15 \
characters, in the same language the conversation is written in. Reply \
with the title only, no quotes and no punctuation around it.";

/// Generate a title for the transcript. Returns `None` when the model
/// produced nothing usable.
pub async fn generate_title(
    llm: &LlmClient,
    worker_id: &str,
    transcript: &str,
    model: &str,
) -> Result<Option<String>, LlmError> {
    let request = ConverseRequest {
        system: vec![SystemBlock::cached(TITLE_PROMPT)],
        messages: vec![ChatMessage::user(transcript)],
        tool_config: None,
        inference: InferenceConfig {
            max_tokens: Some(64),
            temperature: None,
            top_p: None,
        },
    };
    let result = llm
        .converse(worker_id, &[model.to_owned()], &request, 0)
        .await?;
    let raw = extract_text(&result.response.content);
    Ok(clamp_title(&raw))
}

/// Trim and clamp a raw title to the display budget.
#[must_use]
pub fn clamp_title(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('"').trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(TITLE_MAX_CHARS).collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
