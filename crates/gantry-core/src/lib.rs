//! Shared types for the gantry agent session engine.
//!
//! - [`content`]: Content block primitives (the closed sum that appears in
//!   every message)
//! - [`messages`]: Conversation messages, log items, stop reasons, token usage
//! - [`models`]: Model capability registry and id mapping
//! - [`events`]: Progress events and the publisher seam
//! - [`secrets`]: Secret reader seam
//! - [`retry`]: Backoff building blocks for the turn loop's retry wrapper

pub mod content;
pub mod events;
pub mod messages;
pub mod models;
pub mod retry;
pub mod secrets;

pub use content::{ContentBlock, ToolResultBlock, ToolResultStatus};
pub use messages::{ChatMessage, MessageItem, MessageKind, Role, StopReason, TokenUsage};
