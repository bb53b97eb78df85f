//! Log-to-window projection with middle-out truncation.
//!
//! Two projections over the ordered conversation log:
//!
//! - [`no_op_filtering`]: identity projection plus a token sum
//! - [`middle_out_filtering`]: enforce a soft cap by removing one
//!   contiguous range from the *middle* of the log, keeping the earliest
//!   items (task framing) and the latest items (the current tool chain)
//!
//! Token sums come from the per-item `token_count` fields, which carry real
//! billed numbers once attribution has run, not estimates. A
//! `toolUse` item and its `toolResult` are never separated by the cut.

use gantry_core::messages::{ChatMessage, MessageItem, MessageKind};
use tracing::debug;

/// Soft token cap: roughly 95% of a 200k context window.
pub const DEFAULT_TOKEN_CAP: i64 = 190_000;

/// The projected window handed to the LLM client.
#[derive(Clone, Debug)]
pub struct FilteredWindow {
    /// Log items that survived, in order.
    pub items: Vec<MessageItem>,
    /// Provider-message projection of `items`.
    pub messages: Vec<ChatMessage>,
    /// Token sum over `items`.
    pub total_tokens: i64,
    /// Whether a middle range was removed. Truncation invalidates all prior
    /// cache points.
    pub truncated: bool,
}

fn project(items: &[MessageItem]) -> Vec<ChatMessage> {
    items
        .iter()
        .map(|item| ChatMessage::new(item.role, item.content.clone()))
        .collect()
}

fn token_sum(items: &[MessageItem]) -> i64 {
    items.iter().map(|i| i.token_count).sum()
}

/// Identity projection.
#[must_use]
pub fn no_op_filtering(items: &[MessageItem]) -> FilteredWindow {
    FilteredWindow {
        items: items.to_vec(),
        messages: project(items),
        total_tokens: token_sum(items),
        truncated: false,
    }
}

/// Enforce `cap` by removing a contiguous middle range.
///
/// The prefix keeps the earliest items up to at most half the cap; the
/// suffix then grows backward from the end into the remaining budget (the
/// final item is always kept). Cut boundaries are nudged so no
/// `toolUse`/`toolResult` pair is split.
#[must_use]
pub fn middle_out_filtering(items: &[MessageItem], cap: i64) -> FilteredWindow {
    let total = token_sum(items);
    if total <= cap || items.len() <= 2 {
        return no_op_filtering(items);
    }

    // Prefix: earliest items, at most half the budget.
    let prefix_budget = cap / 2;
    let mut prefix_end = 0usize;
    let mut prefix_tokens = 0i64;
    while prefix_end < items.len() {
        let t = items[prefix_end].token_count;
        if prefix_tokens + t > prefix_budget {
            break;
        }
        prefix_tokens += t;
        prefix_end += 1;
    }

    // Suffix: latest items filling the remainder. The final item is kept
    // unconditionally.
    let mut suffix_start = items.len();
    let mut suffix_tokens = 0i64;
    while suffix_start > prefix_end {
        let t = items[suffix_start - 1].token_count;
        if suffix_start != items.len() && prefix_tokens + suffix_tokens + t > cap {
            break;
        }
        suffix_tokens += t;
        suffix_start -= 1;
    }

    if suffix_start <= prefix_end {
        return no_op_filtering(items);
    }

    // Never cut between a toolUse and its toolResult: an orphan on either
    // side of the removed range joins the removal.
    while prefix_end > 0
        && suffix_start > prefix_end
        && items[prefix_end - 1].message_type == MessageKind::ToolUse
    {
        prefix_end -= 1;
    }
    while suffix_start < items.len()
        && suffix_start > prefix_end
        && items[suffix_start].message_type == MessageKind::ToolResult
    {
        suffix_start += 1;
    }

    let mut kept: Vec<MessageItem> = Vec::with_capacity(prefix_end + items.len() - suffix_start);
    kept.extend_from_slice(&items[..prefix_end]);
    kept.extend_from_slice(&items[suffix_start..]);
    let kept_tokens = token_sum(&kept);
    debug!(
        removed = suffix_start - prefix_end,
        kept = kept.len(),
        total_before = total,
        total_after = kept_tokens,
        "middle-out truncation"
    );

    FilteredWindow {
        messages: project(&kept),
        total_tokens: kept_tokens,
        items: kept,
        truncated: true,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
