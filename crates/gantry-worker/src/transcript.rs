//! Conversation transcript.
//!
//! A human-readable digest of the turn — the triggering user message, each
//! progress report, and the final assistant text — used for title
//! generation and the periodic progress echo. Also home to the
//! `<thinking>` tag stripper applied to visible assistant text.

use regex::Regex;
use std::sync::OnceLock;

/// Force a progress echo when this long has passed since the last report.
pub const PROGRESS_ECHO_INTERVAL_MS: i64 = 300_000;

/// Accumulated transcript for one turn.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    entries: Vec<String>,
}

impl Transcript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the triggering user message.
    pub fn push_user(&mut self, text: &str) {
        self.push("User", text);
    }

    /// Record a progress report.
    pub fn push_progress(&mut self, text: &str) {
        self.push("Progress", text);
    }

    /// Record the final assistant reply.
    pub fn push_assistant(&mut self, text: &str) {
        self.push("Assistant", text);
    }

    fn push(&mut self, label: &str, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.entries.push(format!("{label}: {text}"));
        }
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The transcript as one newline-joined string.
    #[must_use]
    pub fn render(&self) -> String {
        self.entries.join("\n")
    }
}

/// Whether the renderer should force a progress echo now.
#[must_use]
pub fn progress_echo_due(last_report_at_ms: Option<i64>, now_ms: i64) -> bool {
    match last_report_at_ms {
        Some(at) => now_ms.saturating_sub(at) > PROGRESS_ECHO_INTERVAL_MS,
        None => true,
    }
}

/// Remove `<thinking>…</thinking>` spans from visible assistant text.
#[must_use]
pub fn strip_thinking_tags(text: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"(?s)<thinking>.*?</thinking>").expect("static pattern"));
    pattern.replace_all(text, "").trim().to_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // -- Transcript --

    #[test]
    fn empty_transcript() {
        let t = Transcript::new();
        assert!(t.is_empty());
        assert_eq!(t.render(), "");
    }

    #[test]
    fn entries_render_in_order() {
        let mut t = Transcript::new();
        t.push_user("fix the build");
        t.push_progress("running tests");
        t.push_assistant("done");
        assert_eq!(
            t.render(),
            "User: fix the build\nProgress: running tests\nAssistant: done"
        );
    }

    #[test]
    fn blank_entries_skipped() {
        let mut t = Transcript::new();
        t.push_user("  ");
        t.push_progress("");
        assert!(t.is_empty());
    }

    // -- progress echo --

    #[test]
    fn echo_due_when_never_reported() {
        assert!(progress_echo_due(None, 1_000_000));
    }

    #[test]
    fn echo_due_after_interval() {
        assert!(progress_echo_due(Some(0), PROGRESS_ECHO_INTERVAL_MS + 1));
        assert!(!progress_echo_due(Some(0), PROGRESS_ECHO_INTERVAL_MS));
    }

    // -- thinking strip --

    #[test]
    fn strips_thinking_span() {
        let text = "<thinking>let me reason</thinking>The answer is 4.";
        assert_eq!(strip_thinking_tags(text), "The answer is 4.");
    }

    #[test]
    fn strips_multiline_and_multiple_spans() {
        let text = "<thinking>a\nb</thinking>One.<thinking>c</thinking> Two.";
        assert_eq!(strip_thinking_tags(text), "One. Two.");
    }

    #[test]
    fn plain_text_untouched() {
        assert_eq!(strip_thinking_tags("Hello."), "Hello.");
    }

    #[test]
    fn unclosed_tag_left_alone() {
        assert_eq!(
            strip_thinking_tags("<thinking>never closed"),
            "<thinking>never closed"
        );
    }
}
