//! Todo list tools.
//!
//! The agent keeps a visible plan in session metadata: `todoInit` replaces
//! the list, `todoUpdate` moves one entry through
//! `pending → inProgress → done`. Both echo the rendered list back so the
//! model sees the current state in its tool result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use gantry_llm::types::ToolSpec;
use gantry_store::MetadataStore;

use super::{object_schema, ToolContext, ToolError, ToolHandler, ToolOutput};

/// Metadata key holding the list.
const TODOS_KEY: &str = "todos";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TodoItem {
    text: String,
    status: TodoStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum TodoStatus {
    Pending,
    InProgress,
    Done,
}

fn render(items: &[TodoItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let mark = match item.status {
                TodoStatus::Pending => " ",
                TodoStatus::InProgress => "~",
                TodoStatus::Done => "x",
            };
            format!("{}. [{}] {}", i + 1, mark, item.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

async fn load(metadata: &MetadataStore, worker_id: &str) -> Result<Vec<TodoItem>, ToolError> {
    let value = metadata
        .get(worker_id, TODOS_KEY)
        .await
        .map_err(|e| ToolError::Failed(e.to_string()))?;
    match value {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(Vec::new()),
    }
}

async fn save(
    metadata: &MetadataStore,
    worker_id: &str,
    items: &[TodoItem],
) -> Result<(), ToolError> {
    metadata
        .set(worker_id, TODOS_KEY, serde_json::to_value(items)?)
        .await
        .map_err(|e| ToolError::Failed(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// todoInit
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TodoInitParams {
    items: Vec<String>,
}

/// `todoInit` — start a fresh task list.
#[derive(Clone)]
pub struct TodoInitTool {
    metadata: MetadataStore,
}

impl TodoInitTool {
    /// Create the tool over the metadata store.
    pub fn new(metadata: MetadataStore) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl ToolHandler for TodoInitTool {
    fn name(&self) -> &str {
        "todoInit"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "todoInit".into(),
            description: "Initialize the task list for this session, replacing any \
                          existing list."
                .into(),
            input_schema: object_schema(&[(
                "items",
                json!({"type": "array", "items": {"type": "string"}, "description": "Task descriptions in execution order"}),
                true,
            )]),
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let params: TodoInitParams = serde_json::from_value(input)?;
        let items: Vec<TodoItem> = params
            .items
            .into_iter()
            .map(|text| TodoItem {
                text,
                status: TodoStatus::Pending,
            })
            .collect();
        save(&self.metadata, &ctx.worker_id, &items).await?;
        Ok(ToolOutput::Text(format!(
            "Task list initialized:\n{}",
            render(&items)
        )))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// todoUpdate
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TodoUpdateParams {
    index: usize,
    status: TodoStatus,
}

/// `todoUpdate` — change one entry's status.
#[derive(Clone)]
pub struct TodoUpdateTool {
    metadata: MetadataStore,
}

impl TodoUpdateTool {
    /// Create the tool over the metadata store.
    pub fn new(metadata: MetadataStore) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl ToolHandler for TodoUpdateTool {
    fn name(&self) -> &str {
        "todoUpdate"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "todoUpdate".into(),
            description: "Update the status of one task list entry.".into(),
            input_schema: object_schema(&[
                (
                    "index",
                    json!({"type": "integer", "description": "1-based task index"}),
                    true,
                ),
                (
                    "status",
                    json!({"type": "string", "enum": ["pending", "inProgress", "done"]}),
                    true,
                ),
            ]),
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let params: TodoUpdateParams = serde_json::from_value(input)?;
        let mut items = load(&self.metadata, &ctx.worker_id).await?;
        let index = params
            .index
            .checked_sub(1)
            .filter(|i| *i < items.len())
            .ok_or_else(|| {
                ToolError::InvalidInput(format!(
                    "index {} out of range (1..={})",
                    params.index,
                    items.len()
                ))
            })?;
        items[index].status = params.status;
        save(&self.metadata, &ctx.worker_id, &items).await?;
        Ok(ToolOutput::Text(format!(
            "Task list updated:\n{}",
            render(&items)
        )))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
