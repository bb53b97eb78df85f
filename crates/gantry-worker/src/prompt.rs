//! System prompt assembly.
//!
//! `base prompt` + optional `## Common Prompt` section + optional
//! `## Repository Knowledge` section loaded from the cloned repository's
//! agent rules file.

use std::path::Path;

use tracing::debug;

/// Rules files probed in the cloned repository, first hit wins.
const KNOWLEDGE_FILES: &[&str] = &["AGENTS.md", "CLAUDE.md"];

/// Assemble the effective system prompt.
pub async fn assemble_system_prompt(
    base: &str,
    common_prompt: Option<&str>,
    repo_directory: Option<&Path>,
) -> String {
    let mut prompt = base.to_owned();
    if let Some(common) = common_prompt {
        if !common.trim().is_empty() {
            prompt.push_str("\n\n## Common Prompt\n\n");
            prompt.push_str(common);
        }
    }
    if let Some(dir) = repo_directory {
        if let Some(knowledge) = load_repository_knowledge(dir).await {
            prompt.push_str("\n\n## Repository Knowledge\n\n");
            prompt.push_str(&knowledge);
        }
    }
    prompt
}

/// Load the repository's agent rules file, if present.
pub async fn load_repository_knowledge(repo_directory: &Path) -> Option<String> {
    for name in KNOWLEDGE_FILES {
        let path = repo_directory.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) if !content.trim().is_empty() => {
                debug!(path = %path.display(), "loaded repository knowledge");
                return Some(content);
            }
            _ => {}
        }
    }
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
