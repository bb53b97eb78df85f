//! Provider-neutral LLM invocation.
//!
//! One operation — [`client::LlmClient::converse`] — over two back ends:
//!
//! - [`providers::bedrock`]: the Bedrock Converse REST API, with
//!   cross-region inference profiles and multi-account rotation
//! - [`providers::anthropic`]: the Anthropic Messages API, with model-id
//!   mapping and block conversion
//!
//! Requests are normalized per model capability before dispatch
//! ([`normalize`]): unsupported tool-choice dropped, output budget
//! escalation, reasoning gating with the `ultrathink` budget bump, and
//! cache-point pruning for layers the model cannot cache.

pub mod account;
pub mod client;
pub mod credentials;
pub mod errors;
pub mod normalize;
pub mod providers;
pub mod types;

pub use account::AccountPool;
pub use client::{LlmClient, ProviderKind};
pub use credentials::{CredentialsProvider, StaticCredentials};
pub use errors::LlmError;
pub use normalize::{normalize_request, NormalizedRequest, ReasoningConfig};
pub use providers::Provider;
pub use types::{
    ConverseRequest, ConverseResponse, ConverseResult, InferenceConfig, SystemBlock, ToolChoice,
    ToolConfig, ToolSpec,
};
