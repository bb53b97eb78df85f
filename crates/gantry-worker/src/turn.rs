//! The turn state machine.
//!
//! One turn: mark the session working, build the call (system prompt,
//! tool catalog, filtered window, cache points), invoke the model through
//! the retry wrapper, then either dispatch the requested tools and loop, or
//! finalize the assistant reply and go back to pending.
//!
//! Cancellation is polled at every suspension point. On cancel the loop
//! exits without appending anything and without flipping the status, so a
//! follow-up action never races a half-finished turn.

use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;
use rand::Rng;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gantry_context::{
    apply_cache_points, middle_out_filtering, no_op_filtering, plan_cache_points,
    FilteredWindow, DEFAULT_TOKEN_CAP,
};
use gantry_core::content::{
    extract_reasoning_text, extract_text, extract_tool_result_text, ContentBlock,
    ToolResultBlock, ToolResultStatus,
};
use gantry_core::events::{AgentEvent, EventPublisher};
use gantry_core::messages::{MessageItem, MessageKind, Role, StopReason, TokenUsage};
use gantry_core::retry::{
    retry_delay_ms, LLM_RETRY_MAX_ATTEMPTS, MAX_TOKENS_ESCALATION_LIMIT,
};
use gantry_llm::types::{ConverseRequest, ConverseResult, InferenceConfig, SystemBlock, ToolConfig};
use gantry_llm::{LlmClient, LlmError};
use gantry_store::{
    AgentStatus, ItemStore, MessageLog, MetadataStore, SessionRecord, SessionStore, TokenLedger,
};

use crate::errors::WorkerError;
use crate::mcp::McpRouter;
use crate::preferences::{Preferences, DEFAULT_SYSTEM_PROMPT};
use crate::prompt::assemble_system_prompt;
use crate::title::generate_title;
use crate::tools::{
    ReportProgressTool, SendImageTool, TodoInitTool, TodoUpdateTool, ToolContext, ToolError,
    ToolOutput, ToolRegistry, REQUIRED_TOOL_NAMES,
};
use crate::transcript::{strip_thinking_tags, Transcript};

/// Reply emitted when the model returns no content at all.
const EMPTY_RESPONSE_PLACEHOLDER: &str = "(The model returned an empty response.)";

/// Invoked (and awaited) when a turn exits through cancellation.
pub type CancelCallback = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// How a turn ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The assistant reply was finalized.
    Completed,
    /// The model returned empty content; a placeholder reply was emitted.
    EmptyResponse,
    /// The cancellation token fired; nothing partial was persisted.
    Cancelled,
    /// Resume found nothing to do.
    NoOp,
}

/// Dependencies for building a [`TurnLoop`].
pub struct TurnLoopConfig {
    /// Backing item store shared by every repository.
    pub store: Arc<dyn ItemStore>,
    /// The LLM client.
    pub llm: Arc<LlmClient>,
    /// Event fan-out.
    pub events: Arc<dyn EventPublisher>,
    /// MCP routing.
    pub mcp: Arc<dyn McpRouter>,
    /// Process preferences.
    pub preferences: Arc<Preferences>,
}

/// The per-session agent turn loop.
pub struct TurnLoop {
    log: MessageLog,
    sessions: SessionStore,
    ledger: TokenLedger,
    metadata: MetadataStore,
    llm: Arc<LlmClient>,
    events: Arc<dyn EventPublisher>,
    tools: ToolRegistry,
    mcp: Arc<dyn McpRouter>,
    preferences: Arc<Preferences>,
    token_cap: i64,
    cancel_callback: Option<CancelCallback>,
}

impl TurnLoop {
    /// Build a loop with the required tools registered.
    pub fn new(config: TurnLoopConfig) -> Self {
        let TurnLoopConfig {
            store,
            llm,
            events,
            mcp,
            preferences,
        } = config;
        let metadata = MetadataStore::new(store.clone());

        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(ReportProgressTool));
        tools.register(Arc::new(TodoInitTool::new(metadata.clone())));
        tools.register(Arc::new(TodoUpdateTool::new(metadata.clone())));
        tools.register(Arc::new(SendImageTool::new(events.clone())));

        Self {
            log: MessageLog::new(store.clone()),
            sessions: SessionStore::new(store.clone()),
            ledger: TokenLedger::new(store),
            metadata,
            llm,
            events,
            tools,
            mcp,
            preferences,
            token_cap: DEFAULT_TOKEN_CAP,
            cancel_callback: None,
        }
    }

    /// Register an additional tool (repository clone, shell execution, and
    /// the rest of the host's catalog).
    pub fn register_tool(&mut self, tool: Arc<dyn crate::tools::ToolHandler>) {
        self.tools.register(tool);
    }

    /// Register a callback awaited when a turn exits through cancellation.
    pub fn set_cancel_callback(&mut self, callback: CancelCallback) {
        self.cancel_callback = Some(callback);
    }

    /// Override the context token cap (tests).
    pub fn set_token_cap(&mut self, cap: i64) {
        self.token_cap = cap;
    }

    /// Run one turn for a freshly appended user message.
    pub async fn on_message_received(
        &self,
        worker_id: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, WorkerError> {
        match self.run_turn(worker_id, &cancel).await {
            Err(WorkerError::Cancelled) => {
                info!(worker_id, "turn cancelled");
                if let Some(callback) = &self.cancel_callback {
                    callback().await;
                }
                Ok(TurnOutcome::Cancelled)
            }
            other => other,
        }
    }

    /// Idempotent restart entry point: runs one turn when the last item is
    /// a user message or tool result, and does nothing otherwise.
    pub async fn resume(
        &self,
        worker_id: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, WorkerError> {
        match self.log.last(worker_id).await? {
            Some(item) if item.is_turn_trigger() => {
                info!(worker_id, "resuming pending turn");
                self.on_message_received(worker_id, cancel).await
            }
            _ => Ok(TurnOutcome::NoOp),
        }
    }

    // ── The state machine ───────────────────────────────────────────────

    async fn run_turn(
        &self,
        worker_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, WorkerError> {
        // ENTRY
        self.sessions
            .update_status(worker_id, AgentStatus::Working)
            .await?;
        let session = self.sessions.get_required(worker_id).await?;
        let custom_agent = self
            .preferences
            .custom_agent(session.custom_agent_id.as_deref());

        let base_prompt = custom_agent
            .map_or(DEFAULT_SYSTEM_PROMPT, |agent| agent.system_prompt.as_str());
        let mut system_prompt = self.derive_system_prompt(worker_id, base_prompt).await?;
        let tool_config = self.build_tool_catalog(custom_agent.map(|a| a.tools.as_slice()));

        let entry_items = self.log.list(worker_id).await?;
        let candidates = self.candidate_models(&session, &entry_items);
        let mut transcript = Transcript::new();
        if let Some(user_item) = entry_items
            .iter()
            .rev()
            .find(|i| i.message_type == MessageKind::UserMessage)
        {
            transcript.push_user(&extract_text(&user_item.content));
        }

        loop {
            // BUILD CALL
            if cancel.is_cancelled() {
                return Err(WorkerError::Cancelled);
            }
            let items = self.log.list(worker_id).await?;
            let window = self.build_window(&items);
            let mut messages = window.messages.clone();
            let plan = plan_cache_points(messages.len(), window.truncated);
            apply_cache_points(&mut messages, &plan);

            let request = ConverseRequest {
                system: vec![SystemBlock::cached(system_prompt.clone())],
                messages,
                tool_config: tool_config.clone(),
                inference: InferenceConfig::default(),
            };

            // INVOKE
            let result = self
                .invoke_with_retry(worker_id, &candidates, &request, cancel)
                .await?;
            if cancel.is_cancelled() {
                // In-flight result is discarded; nothing gets appended.
                return Err(WorkerError::Cancelled);
            }

            self.track_billing(worker_id, &items, &result.response.usage)
                .await;

            let content = result.response.content.clone();
            if content.is_empty() {
                // Benign terminal state.
                self.emit(
                    worker_id,
                    AgentEvent::Message {
                        role: Role::Assistant,
                        text: EMPTY_RESPONSE_PLACEHOLDER.into(),
                    },
                )
                .await;
                self.sessions
                    .update_status(worker_id, AgentStatus::Pending)
                    .await?;
                return Ok(TurnOutcome::EmptyResponse);
            }

            let tool_uses: Vec<(String, String, Map<String, Value>)> = content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, name, input } => {
                        Some((id.clone(), name.clone(), input.clone()))
                    }
                    _ => None,
                })
                .collect();

            if result.response.stop_reason == StopReason::ToolUse && !tool_uses.is_empty() {
                // DISPATCH TOOLS
                let reasoning_text =
                    extract_reasoning_text(&content).map(str::to_owned);
                let mut result_blocks = Vec::with_capacity(tool_uses.len());

                for (position, (tool_use_id, name, input)) in tool_uses.iter().enumerate() {
                    if cancel.is_cancelled() {
                        // No orphan: the pair has not been written yet.
                        return Err(WorkerError::Cancelled);
                    }
                    self.emit(
                        worker_id,
                        AgentEvent::ToolUse {
                            tool_name: name.clone(),
                            tool_use_id: tool_use_id.clone(),
                            input: Value::Object(input.clone()).to_string(),
                            thinking_budget: result.thinking_budget,
                            reasoning_text: if position == 0 {
                                reasoning_text.clone()
                            } else {
                                None
                            },
                        },
                    )
                    .await;

                    let (blocks, status, rendered) =
                        self.dispatch_tool(worker_id, tool_use_id, name, input).await;
                    self.emit(
                        worker_id,
                        AgentEvent::ToolResult {
                            tool_name: name.clone(),
                            tool_use_id: tool_use_id.clone(),
                            output: rendered,
                        },
                    )
                    .await;
                    result_blocks.push(ContentBlock::ToolResult {
                        tool_use_id: tool_use_id.clone(),
                        content: blocks,
                        status: Some(status),
                    });

                    // Post-effects.
                    if name == "reportProgress" {
                        if let Some(message) = input.get("message").and_then(Value::as_str) {
                            transcript.push_progress(message);
                        }
                        self.touch_last_report(worker_id).await;
                    }
                    if name == "cloneRepository" {
                        system_prompt =
                            self.derive_system_prompt(worker_id, base_prompt).await?;
                    }
                }

                let tool_use_item =
                    MessageItem::new(Role::Assistant, MessageKind::ToolUse, content);
                let tool_result_item =
                    MessageItem::new(Role::User, MessageKind::ToolResult, result_blocks);
                #[allow(clippy::cast_possible_wrap)]
                let output_tokens = result.response.usage.output_tokens as i64;
                let _ = self
                    .log
                    .append_pair(
                        worker_id,
                        tool_use_item,
                        tool_result_item,
                        output_tokens,
                        result.thinking_budget,
                    )
                    .await?;
                continue;
            }

            // FINALIZE
            let mut item =
                MessageItem::new(Role::Assistant, MessageKind::AssistantResponse, content);
            #[allow(clippy::cast_possible_wrap)]
            {
                item.token_count = result.response.usage.output_tokens as i64;
            }
            item.thinking_budget = result.thinking_budget;
            let visible = strip_thinking_tags(&extract_text(&item.content));
            let _ = self.log.append(worker_id, item).await?;
            transcript.push_assistant(&visible);

            self.maybe_generate_title(worker_id, &session, &transcript)
                .await;
            self.emit(
                worker_id,
                AgentEvent::Message {
                    role: Role::Assistant,
                    text: visible,
                },
            )
            .await;
            self.sessions
                .update_status(worker_id, AgentStatus::Pending)
                .await?;
            return Ok(TurnOutcome::Completed);
        }
    }

    // ── Call construction ───────────────────────────────────────────────

    fn build_window(&self, items: &[MessageItem]) -> FilteredWindow {
        let total: i64 = items.iter().map(|i| i.token_count).sum();
        if total > self.token_cap {
            middle_out_filtering(items, self.token_cap)
        } else {
            no_op_filtering(items)
        }
    }

    async fn derive_system_prompt(
        &self,
        worker_id: &str,
        base_prompt: &str,
    ) -> Result<String, WorkerError> {
        let repo_directory = self.metadata.repo_directory(worker_id).await?;
        Ok(assemble_system_prompt(
            base_prompt,
            self.preferences.common_prompt.as_deref(),
            repo_directory.as_deref().map(Path::new),
        )
        .await)
    }

    fn build_tool_catalog(&self, agent_tools: Option<&[String]>) -> Option<ToolConfig> {
        let mut names: Vec<String> = match agent_tools {
            Some(tools) => tools.to_vec(),
            None => self.tools.names(),
        };
        for required in REQUIRED_TOOL_NAMES {
            if !names.iter().any(|n| n == required) {
                names.push((*required).to_owned());
            }
        }
        let mut specs = self.tools.specs_for(&names);
        specs.extend(self.mcp.tool_specs());
        if specs.is_empty() {
            // An empty catalog plus the trailing cache point is rejected by
            // some providers; send no catalog at all.
            return None;
        }
        Some(ToolConfig {
            tools: specs,
            cache_point: true,
            tool_choice: None,
        })
    }

    fn candidate_models(&self, session: &SessionRecord, items: &[MessageItem]) -> Vec<String> {
        if let Some(model) = &session.model_override {
            return vec![model.clone()];
        }
        let latest_user_override = items
            .iter()
            .rev()
            .find(|i| i.message_type == MessageKind::UserMessage)
            .and_then(|i| i.model_override.clone());
        if let Some(model) = latest_user_override {
            return vec![model];
        }
        self.preferences.default_models.clone()
    }

    // ── Invocation & retry ──────────────────────────────────────────────

    async fn invoke_with_retry(
        &self,
        worker_id: &str,
        candidates: &[String],
        request: &ConverseRequest,
        cancel: &CancellationToken,
    ) -> Result<ConverseResult, WorkerError> {
        let mut escalations = 0u32;
        for attempt in 1..=LLM_RETRY_MAX_ATTEMPTS {
            if cancel.is_cancelled() {
                return Err(WorkerError::Cancelled);
            }
            match self
                .llm
                .converse(worker_id, candidates, request, escalations)
                .await
            {
                Ok(result) if result.response.stop_reason == StopReason::MaxTokens => {
                    escalations += 1;
                    if escalations > MAX_TOKENS_ESCALATION_LIMIT {
                        return Err(WorkerError::MaxTokensEscalation);
                    }
                    warn!(
                        worker_id,
                        attempt, escalations, "output cap hit, doubling budget"
                    );
                    self.backoff().await;
                }
                Ok(result) => return Ok(result),
                Err(LlmError::Throttled { message }) => {
                    debug!(worker_id, attempt, %message, "throttled, backing off");
                    self.backoff().await;
                }
                Err(error) => return Err(WorkerError::Llm(error)),
            }
        }
        Err(WorkerError::RetriesExhausted)
    }

    async fn backoff(&self) {
        let delay = retry_delay_ms(rand::thread_rng().gen::<f64>());
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
    }

    // ── Tool dispatch ───────────────────────────────────────────────────

    async fn dispatch_tool(
        &self,
        worker_id: &str,
        tool_use_id: &str,
        name: &str,
        input: &Map<String, Value>,
    ) -> (Vec<ToolResultBlock>, ToolResultStatus, String) {
        let input_value = Value::Object(input.clone());
        let outcome = if self.mcp.serves(name) {
            self.mcp.call(name, &input_value).await
        } else if let Some(tool) = self.tools.get(name) {
            let ctx = ToolContext {
                tool_use_id: tool_use_id.to_owned(),
                worker_id: worker_id.to_owned(),
                preferences: self.preferences.clone(),
            };
            tool.execute(input_value, &ctx).await
        } else {
            Err(ToolError::UnknownTool(name.to_owned()))
        };

        match outcome {
            Ok(ToolOutput::Text(text)) => {
                let blocks = vec![ToolResultBlock::text(&text)];
                (blocks, ToolResultStatus::Success, text)
            }
            Ok(ToolOutput::Blocks(blocks)) => {
                let rendered = extract_tool_result_text(&blocks);
                (blocks, ToolResultStatus::Success, rendered)
            }
            Err(error) => {
                warn!(worker_id, tool = name, %error, "tool failed");
                let message = format!("Error occurred when using tool {name}: {error}");
                (
                    vec![ToolResultBlock::text(&message)],
                    ToolResultStatus::Error,
                    message,
                )
            }
        }
    }

    // ── Bookkeeping ─────────────────────────────────────────────────────

    /// Reconcile the provider's billed input tokens against the counts on
    /// file, attributing the delta to the last user-role item, then roll up
    /// the session cost. Both writes are best-effort.
    async fn track_billing(&self, worker_id: &str, items: &[MessageItem], usage: &TokenUsage) {
        #[allow(clippy::cast_possible_wrap)]
        let billed = usage.billed_input() as i64;
        let on_file: i64 = items.iter().map(|i| i.token_count).sum();
        let delta = billed - on_file;
        if delta != 0 {
            if let Some(last_user) = items.iter().rev().find(|i| i.role == Role::User) {
                if let Err(error) = self
                    .log
                    .update_token_count(worker_id, &last_user.sk, last_user.token_count + delta)
                    .await
                {
                    warn!(worker_id, %error, "token attribution write failed");
                }
            }
        }
        if let Err(error) =
            gantry_store::pricing::rollup_session_cost(&self.ledger, &self.sessions, worker_id)
                .await
        {
            warn!(worker_id, %error, "cost rollup failed");
        }
    }

    async fn touch_last_report(&self, worker_id: &str) {
        let now = chrono::Utc::now().timestamp_millis();
        if let Err(error) = self
            .metadata
            .set(worker_id, "lastReportAt", Value::from(now))
            .await
        {
            warn!(worker_id, %error, "last-report timestamp write failed");
        }
    }

    async fn maybe_generate_title(
        &self,
        worker_id: &str,
        session: &SessionRecord,
        transcript: &Transcript,
    ) {
        if session.title.is_some() || transcript.is_empty() {
            return;
        }
        match generate_title(
            &self.llm,
            worker_id,
            &transcript.render(),
            &self.preferences.title_model,
        )
        .await
        {
            Ok(Some(title)) => {
                if let Err(error) = self.sessions.update_title(worker_id, &title).await {
                    warn!(worker_id, %error, "title write failed");
                    return;
                }
                self.emit(worker_id, AgentEvent::SessionTitleUpdate { new_title: title })
                    .await;
            }
            Ok(None) => {}
            Err(error) => warn!(worker_id, %error, "title generation failed"),
        }
    }

    async fn emit(&self, worker_id: &str, event: AgentEvent) {
        let kind = event.kind();
        if let Err(error) = self.events.publish(worker_id, event).await {
            warn!(worker_id, kind, %error, "event publish failed");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
