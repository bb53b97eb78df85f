//! End-to-end turn scenarios against a scripted provider, an in-memory
//! store, and a capturing event publisher.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use gantry_core::content::{extract_text, ContentBlock};
use gantry_core::events::{AgentEvent, EventError, EventPublisher};
use gantry_core::messages::{MessageItem, MessageKind, Role, StopReason, TokenUsage};
use gantry_core::models::model_ids;
use gantry_llm::types::ConverseResponse;
use gantry_llm::{LlmClient, LlmError, NormalizedRequest, Provider, ProviderKind};
use gantry_store::{
    AgentStatus, ItemStore, MemoryItemStore, MessageLog, SessionRecord, SessionStore,
    TokenLedger,
};
use gantry_worker::tools::{ToolContext, ToolError, ToolHandler, ToolOutput};
use gantry_worker::{NullMcpRouter, Preferences, TurnLoop, TurnLoopConfig, TurnOutcome};

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

struct ScriptedProvider {
    outcomes: Mutex<VecDeque<Result<ConverseResponse, LlmError>>>,
    seen_max_tokens: Mutex<Vec<u32>>,
    seen_requests: Mutex<Vec<NormalizedRequest>>,
}

impl ScriptedProvider {
    fn new(outcomes: Vec<Result<ConverseResponse, LlmError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            seen_max_tokens: Mutex::new(Vec::new()),
            seen_requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn converse(
        &self,
        _model_id: &str,
        request: &NormalizedRequest,
    ) -> Result<ConverseResponse, LlmError> {
        self.seen_max_tokens.lock().unwrap().push(request.max_tokens);
        self.seen_requests.lock().unwrap().push(request.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(LlmError::Api {
                    status: 500,
                    message: "script exhausted".into(),
                })
            })
    }
}

#[derive(Default)]
struct CapturingPublisher {
    events: Mutex<Vec<AgentEvent>>,
}

#[async_trait]
impl EventPublisher for CapturingPublisher {
    async fn publish(&self, _worker_id: &str, event: AgentEvent) -> Result<(), EventError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

impl CapturingPublisher {
    fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(AgentEvent::kind).collect()
    }
}

struct Harness {
    store: Arc<dyn ItemStore>,
    provider: Arc<ScriptedProvider>,
    publisher: Arc<CapturingPublisher>,
    llm: Arc<LlmClient>,
    turn_loop: TurnLoop,
}

impl Harness {
    fn new(outcomes: Vec<Result<ConverseResponse, LlmError>>) -> Self {
        Self::with_accounts(outcomes, Vec::new())
    }

    fn with_accounts(
        outcomes: Vec<Result<ConverseResponse, LlmError>>,
        accounts: Vec<String>,
    ) -> Self {
        let store: Arc<dyn ItemStore> = Arc::new(MemoryItemStore::new());
        let provider = Arc::new(ScriptedProvider::new(outcomes));
        let publisher = Arc::new(CapturingPublisher::default());
        let ledger = TokenLedger::new(store.clone());
        let llm = Arc::new(
            LlmClient::with_provider(ProviderKind::Bedrock, provider.clone())
                .with_accounts(accounts)
                .with_ledger(ledger),
        );
        let turn_loop = TurnLoop::new(TurnLoopConfig {
            store: store.clone(),
            llm: llm.clone(),
            events: publisher.clone(),
            mcp: Arc::new(NullMcpRouter),
            preferences: Arc::new(Preferences::default()),
        });
        Self {
            store,
            provider,
            publisher,
            llm,
            turn_loop,
        }
    }

    fn sessions(&self) -> SessionStore {
        SessionStore::new(self.store.clone())
    }

    fn log(&self) -> MessageLog {
        MessageLog::new(self.store.clone())
    }

    fn ledger(&self) -> TokenLedger {
        TokenLedger::new(self.store.clone())
    }

    async fn seed_session(&self, worker_id: &str, first_message: &str) {
        self.sessions()
            .create(&SessionRecord::new(worker_id, "test"))
            .await
            .unwrap();
        let _ = self
            .log()
            .append(worker_id, MessageItem::user_text(first_message))
            .await
            .unwrap();
    }
}

fn usage(input: u64, output: u64) -> TokenUsage {
    TokenUsage {
        input_tokens: input,
        output_tokens: output,
        cache_read_input_tokens: 0,
        cache_write_input_tokens: 0,
    }
}

fn text_response(text: &str, input: u64, output: u64) -> ConverseResponse {
    ConverseResponse {
        content: vec![ContentBlock::text(text)],
        stop_reason: StopReason::EndTurn,
        usage: usage(input, output),
    }
}

fn tool_use_response(id: &str, name: &str, input: Value) -> ConverseResponse {
    let input = input.as_object().cloned().unwrap_or_default();
    ConverseResponse {
        content: vec![ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }],
        stop_reason: StopReason::ToolUse,
        usage: usage(50, 20),
    }
}

fn max_tokens_response() -> ConverseResponse {
    ConverseResponse {
        content: vec![ContentBlock::text("truncat")],
        stop_reason: StopReason::MaxTokens,
        usage: usage(10, 8192),
    }
}

struct FakeCommandTool;

#[async_trait]
impl ToolHandler for FakeCommandTool {
    fn name(&self) -> &str {
        "commandExecution"
    }

    fn spec(&self) -> gantry_llm::types::ToolSpec {
        gantry_llm::types::ToolSpec {
            name: "commandExecution".into(),
            description: "Run a shell command".into(),
            input_schema: json!({"type": "object", "properties": {"cmd": {"type": "string"}}, "required": ["cmd"]}),
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let cmd = input
            .get("cmd")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("cmd is required".into()))?;
        assert_eq!(cmd, "ls");
        Ok(ToolOutput::Text("a.txt\nb.txt".into()))
    }
}

/// Cancels the shared token while "executing", simulating an out-of-band
/// cancel landing mid-tool.
struct CancellingTool {
    token: CancellationToken,
}

#[async_trait]
impl ToolHandler for CancellingTool {
    fn name(&self) -> &str {
        "commandExecution"
    }

    fn spec(&self) -> gantry_llm::types::ToolSpec {
        gantry_llm::types::ToolSpec {
            name: "commandExecution".into(),
            description: "Run a shell command".into(),
            input_schema: json!({"type": "object"}),
        }
    }

    async fn execute(&self, _input: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        self.token.cancel();
        Ok(ToolOutput::Text("interrupted output".into()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 1: simple turn, no tools
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn simple_turn_without_tools() {
    let harness = Harness::new(vec![
        Ok(text_response("Hi.", 25, 5)),
        Ok(text_response("Greeting", 10, 3)), // title call
    ]);
    harness.seed_session("w", "Say hi.").await;

    let outcome = harness
        .turn_loop
        .on_message_received("w", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);

    // One assistant response persisted.
    let items = harness.log().list("w").await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].message_type, MessageKind::AssistantResponse);
    assert_eq!(extract_text(&items[1].content), "Hi.");

    // Billed input attributed to the user item; output on the assistant.
    assert_eq!(items[0].token_count, 25);
    assert_eq!(items[1].token_count, 5);

    // Title set, within budget, and announced before the final reply.
    let session = harness.sessions().get("w").await.unwrap().unwrap();
    assert_eq!(session.title.as_deref(), Some("Greeting"));
    assert!(session.title.unwrap().chars().count() <= 15);
    assert_eq!(session.agent_status, AgentStatus::Pending);
    assert!(session.cost > 0.0);
    assert_eq!(
        harness.publisher.kinds(),
        vec!["sessionTitleUpdate", "message"]
    );
    let events = harness.publisher.events.lock().unwrap();
    assert!(matches!(
        &events[1],
        AgentEvent::Message { role: Role::Assistant, text } if text == "Hi."
    ));

    // Ledger tracked the main model's usage.
    let entries = harness.ledger().list("w").await.unwrap();
    let sonnet = entries
        .iter()
        .find(|e| e.model_id == model_ids::CLAUDE_SONNET_4_5)
        .unwrap();
    assert_eq!(sonnet.input_tokens, 25);
    assert_eq!(sonnet.output_tokens, 5);
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 2: single tool round-trip
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn single_tool_round_trip() {
    let mut harness = Harness::new(vec![
        Ok(tool_use_response("t1", "commandExecution", json!({"cmd": "ls"}))),
        Ok(text_response("Found 2 files.", 80, 6)),
    ]);
    harness.turn_loop.register_tool(Arc::new(FakeCommandTool));
    harness.seed_session("w", "list files.").await;

    let outcome = harness
        .turn_loop
        .on_message_received("w", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);

    // History: user, assistant(toolUse), user(toolResult), assistant(text).
    let items = harness.log().list("w").await.unwrap();
    assert_eq!(items.len(), 4);
    assert_eq!(items[0].message_type, MessageKind::UserMessage);
    assert_eq!(items[1].message_type, MessageKind::ToolUse);
    assert_eq!(items[1].role, Role::Assistant);
    assert_eq!(items[2].message_type, MessageKind::ToolResult);
    assert_eq!(items[2].role, Role::User);
    assert_eq!(items[3].message_type, MessageKind::AssistantResponse);
    assert_eq!(extract_text(&items[3].content), "Found 2 files.");

    // The pair shares the tool use id and is adjacent.
    let ContentBlock::ToolUse { id: use_id, .. } = &items[1].content[0] else {
        panic!("expected toolUse block");
    };
    let ContentBlock::ToolResult { tool_use_id, content, .. } = &items[2].content[0] else {
        panic!("expected toolResult block");
    };
    assert_eq!(use_id, "t1");
    assert_eq!(tool_use_id, "t1");
    assert_eq!(
        gantry_core::content::extract_tool_result_text(content),
        "a.txt\nb.txt"
    );

    // Events: toolUse, toolResult, then the final message.
    assert_eq!(
        harness.publisher.kinds(),
        vec!["toolUse", "toolResult", "message"]
    );
    let events = harness.publisher.events.lock().unwrap();
    assert!(matches!(
        &events[0],
        AgentEvent::ToolUse { tool_name, tool_use_id, .. }
            if tool_name == "commandExecution" && tool_use_id == "t1"
    ));
    assert!(matches!(
        &events[1],
        AgentEvent::ToolResult { output, .. } if output == "a.txt\nb.txt"
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 3: throttle then success
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn throttle_rotates_account_then_succeeds() {
    let harness = Harness::with_accounts(
        vec![
            Err(LlmError::Throttled {
                message: "429".into(),
            }),
            Ok(text_response("Hi.", 10, 2)),
        ],
        vec!["111".into(), "222".into(), "333".into()],
    );
    harness.seed_session("w", "Say hi.").await;

    let outcome = harness
        .turn_loop
        .on_message_received("w", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);

    // Exactly one assistant item, no spurious appends.
    let items = harness.log().list("w").await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].message_type, MessageKind::AssistantResponse);

    // The throttle advanced the account index by exactly one; neither
    // the successful call nor the failed title call (script exhausted,
    // benign) moved it further.
    assert_eq!(harness.llm.accounts().current_index(), 1);
    assert_eq!(harness.provider.seen_max_tokens.lock().unwrap().len(), 3);
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 4: max-tokens escalation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn max_tokens_escalation_doubles_budget() {
    let harness = Harness::new(vec![
        Ok(max_tokens_response()),
        Ok(max_tokens_response()),
        Ok(max_tokens_response()),
        Ok(text_response("Done.", 10, 4)),
    ]);
    harness.seed_session("w", "Write a long report.").await;

    let outcome = harness
        .turn_loop
        .on_message_received("w", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);

    // 8192 → 16384 → 32768 → 65536 capped at the model max (64000).
    let seen = harness.provider.seen_max_tokens.lock().unwrap();
    assert_eq!(seen[..4], [8_192, 16_384, 32_768, 64_000]);
}

#[tokio::test(start_paused = true)]
async fn max_tokens_aborts_after_five_escalations() {
    let harness = Harness::new(vec![
        Ok(max_tokens_response()),
        Ok(max_tokens_response()),
        Ok(max_tokens_response()),
        Ok(max_tokens_response()),
        Ok(max_tokens_response()),
        Ok(max_tokens_response()),
    ]);
    harness.seed_session("w", "go").await;

    let err = harness
        .turn_loop
        .on_message_received("w", CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        gantry_worker::WorkerError::MaxTokensEscalation
    ));

    // Aborted turn leaves the session working for inspection or resume.
    let session = harness.sessions().get("w").await.unwrap().unwrap();
    assert_eq!(session.agent_status, AgentStatus::Working);
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 5: context overflow triggers middle-out
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn context_overflow_triggers_middle_out() {
    let harness = Harness::new(vec![Ok(text_response("ok", 100, 3))]);
    harness.seed_session("w", "original task statement").await;
    let log = harness.log();

    // ~500k tokens of prior conversation.
    for i in 0..50 {
        let mut item = if i % 2 == 0 {
            MessageItem::assistant_text(format!("reply {i}"))
        } else {
            MessageItem::user_text(format!("message {i}"))
        };
        item.token_count = 10_000;
        let _ = log.append("w", item).await.unwrap();
    }
    let _ = log
        .append("w", MessageItem::user_text("continue"))
        .await
        .unwrap();

    let outcome = harness
        .turn_loop
        .on_message_received("w", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);

    let requests = harness.provider.seen_requests.lock().unwrap();
    let request = &requests[0].request;

    // The middle got dropped; the earliest and latest items survive.
    assert!(request.messages.len() < 52);
    assert_eq!(
        extract_text(&request.messages[0].content),
        "original task statement"
    );
    let last = request.messages.last().unwrap();
    assert_eq!(extract_text(&last.content), "continue");

    // Truncation collapsed both cache points onto the last message.
    let marked: Vec<usize> = request
        .messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.content.iter().any(ContentBlock::is_cache_point))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(marked, vec![request.messages.len() - 1]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 6: cancellation mid-tool
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn cancellation_mid_tool_leaves_no_orphan() {
    let cancel = CancellationToken::new();
    let mut harness = Harness::new(vec![Ok(tool_use_response(
        "t1",
        "commandExecution",
        json!({"cmd": "sleep"}),
    ))]);
    harness.turn_loop.register_tool(Arc::new(CancellingTool {
        token: cancel.clone(),
    }));
    let callback_count = Arc::new(AtomicUsize::new(0));
    {
        let callback_count = callback_count.clone();
        harness.turn_loop.set_cancel_callback(Box::new(move || {
            let callback_count = callback_count.clone();
            Box::pin(async move {
                let _ = callback_count.fetch_add(1, Ordering::SeqCst);
            })
        }));
    }
    harness.seed_session("w", "run something").await;

    let outcome = harness
        .turn_loop
        .on_message_received("w", cancel)
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Cancelled);

    // Either the whole pair or nothing: never an orphaned toolUse.
    let items = harness.log().list("w").await.unwrap();
    let tool_uses = items
        .iter()
        .filter(|i| i.message_type == MessageKind::ToolUse)
        .count();
    let tool_results = items
        .iter()
        .filter(|i| i.message_type == MessageKind::ToolResult)
        .count();
    assert_eq!(tool_uses, tool_results);

    // Status stays working (no flip to pending), callback ran exactly once.
    let session = harness.sessions().get("w").await.unwrap().unwrap();
    assert_eq!(session.agent_status, AgentStatus::Working);
    assert_eq!(callback_count.load(Ordering::SeqCst), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Resume and empty responses
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn resume_after_assistant_response_is_noop() {
    let harness = Harness::new(vec![]);
    harness.seed_session("w", "hello").await;
    let _ = harness
        .log()
        .append("w", MessageItem::assistant_text("done"))
        .await
        .unwrap();

    let outcome = harness
        .turn_loop
        .resume("w", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::NoOp);
    assert!(harness.provider.seen_max_tokens.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn resume_after_user_message_runs_one_turn() {
    let harness = Harness::new(vec![Ok(text_response("resumed", 10, 2))]);
    harness.seed_session("w", "pending work").await;

    let outcome = harness
        .turn_loop
        .resume("w", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);
    let items = harness.log().list("w").await.unwrap();
    assert_eq!(items.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn resume_on_empty_log_is_noop() {
    let harness = Harness::new(vec![]);
    harness
        .sessions()
        .create(&SessionRecord::new("w", "test"))
        .await
        .unwrap();
    let outcome = harness
        .turn_loop
        .resume("w", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::NoOp);
}

#[tokio::test(start_paused = true)]
async fn empty_response_is_benign_terminal() {
    let harness = Harness::new(vec![Ok(ConverseResponse {
        content: vec![],
        stop_reason: StopReason::EndTurn,
        usage: usage(5, 0),
    })]);
    harness.seed_session("w", "hello").await;

    let outcome = harness
        .turn_loop
        .on_message_received("w", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::EmptyResponse);

    // No assistant item persisted, placeholder message emitted, pending.
    let items = harness.log().list("w").await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(harness.publisher.kinds(), vec!["message"]);
    let session = harness.sessions().get("w").await.unwrap().unwrap();
    assert_eq!(session.agent_status, AgentStatus::Pending);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool errors keep the loop alive
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn invalid_tool_input_becomes_error_result() {
    let mut harness = Harness::new(vec![
        // cmd is missing → schema validation fails inside the tool.
        Ok(tool_use_response("t1", "commandExecution", json!({}))),
        Ok(text_response("I hit an error.", 40, 5)),
    ]);
    harness.turn_loop.register_tool(Arc::new(FakeCommandTool));
    harness.seed_session("w", "list files").await;

    let outcome = harness
        .turn_loop
        .on_message_received("w", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);

    let items = harness.log().list("w").await.unwrap();
    let ContentBlock::ToolResult { content, status, .. } = &items[2].content[0] else {
        panic!("expected toolResult block");
    };
    assert_eq!(*status, Some(gantry_core::content::ToolResultStatus::Error));
    let text = gantry_core::content::extract_tool_result_text(content);
    assert!(text.starts_with("Error occurred when using tool commandExecution:"));
}

#[tokio::test(start_paused = true)]
async fn unknown_tool_becomes_error_result() {
    let harness = Harness::new(vec![
        Ok(tool_use_response("t1", "doesNotExist", json!({}))),
        Ok(text_response("Recovered.", 30, 4)),
    ]);
    harness.seed_session("w", "go").await;

    let outcome = harness
        .turn_loop
        .on_message_received("w", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);

    let items = harness.log().list("w").await.unwrap();
    let ContentBlock::ToolResult { content, .. } = &items[2].content[0] else {
        panic!("expected toolResult block");
    };
    let text = gantry_core::content::extract_tool_result_text(content);
    assert!(text.contains("unknown tool: doesNotExist"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Billed-token attribution
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn billed_tokens_attributed_to_last_user_item() {
    let mut harness = Harness::new(vec![
        Ok(tool_use_response("t1", "commandExecution", json!({"cmd": "ls"}))),
        Ok(text_response("Found.", 130, 6)),
    ]);
    harness.turn_loop.register_tool(Arc::new(FakeCommandTool));
    harness.seed_session("w", "list files.").await;

    let _ = harness
        .turn_loop
        .on_message_received("w", CancellationToken::new())
        .await
        .unwrap();

    let items = harness.log().list("w").await.unwrap();
    // First call billed 50, attributed to the user item.
    assert_eq!(items[0].token_count, 50);
    // Tool round-trip carried the assistant's 20 output tokens.
    assert_eq!(items[1].token_count, 20);
    // Second call billed 130; 50 + 20 already on file, so the toolResult
    // item (last user-role item) absorbed the remaining 60.
    assert_eq!(items[2].token_count, 60);
    // Session total matches the provider's billed input.
    let total: i64 = items.iter().map(|i| i.token_count).sum();
    assert_eq!(total, 130 + 6);
}
