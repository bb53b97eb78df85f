//! The agent turn loop.
//!
//! One worker process serves one session. A turn starts when a user message
//! (or pending tool result) is on file, drives the model through as many
//! tool iterations as it asks for, and ends on a non-tool stop reason —
//! persisting every step, publishing progress events, and staying
//! responsive to cooperative cancellation throughout.

pub mod config;
pub mod errors;
pub mod events;
pub mod mcp;
pub mod preferences;
pub mod prompt;
pub mod title;
pub mod tools;
pub mod transcript;
pub mod turn;

pub use config::WorkerConfig;
pub use errors::WorkerError;
pub use events::HttpEventPublisher;
pub use mcp::{McpRouter, NullMcpRouter};
pub use preferences::{CustomAgent, Preferences};
pub use turn::{TurnLoop, TurnLoopConfig, TurnOutcome};
