//! Sliding message-level cache points.
//!
//! Up to two cache points go into the message list before each call:
//!
//! - `second` — the last message, ending the current turn's prefix
//! - `first` — the item at `len - 3` (the previous user/toolResult
//!   boundary), so the cached prefix survives one tool round-trip
//!
//! With two or fewer messages, or right after middle-out truncation (which
//! invalidates every prior cache point), both collapse onto the last
//! message. Recomputing per call makes the "first" slot advance to the
//! previous "second" slot, which is what keeps provider cache hits high
//! across successive tool iterations.

use gantry_core::content::ContentBlock;
use gantry_core::messages::ChatMessage;

/// Where the two cache points land, as message indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePointPlan {
    /// The older slot.
    pub first: Option<usize>,
    /// The newer slot (always the last message).
    pub second: Option<usize>,
}

/// Plan cache points for a window of `len` messages.
#[must_use]
pub fn plan_cache_points(len: usize, truncated: bool) -> CachePointPlan {
    if len == 0 {
        return CachePointPlan {
            first: None,
            second: None,
        };
    }
    let second = len - 1;
    let first = if len > 2 && !truncated { len - 3 } else { second };
    CachePointPlan {
        first: Some(first),
        second: Some(second),
    }
}

/// Append cache point markers to the planned messages.
///
/// When both slots collapse onto one message, a single marker is emitted.
pub fn apply_cache_points(messages: &mut [ChatMessage], plan: &CachePointPlan) {
    if let Some(first) = plan.first {
        if plan.second != Some(first) {
            if let Some(message) = messages.get_mut(first) {
                message.content.push(ContentBlock::CachePoint);
            }
        }
    }
    if let Some(second) = plan.second {
        if let Some(message) = messages.get_mut(second) {
            message.content.push(ContentBlock::CachePoint);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
