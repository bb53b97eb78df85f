//! Per-`(session, model)` token counters.
//!
//! One partition per session (`PK = "token-" + workerId`), one item per
//! model id. Counters only ever grow. Writes are best-effort at the call
//! sites — losing a tick is acceptable, blocking a turn is not.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use gantry_core::messages::TokenUsage;

use crate::errors::StoreError;
use crate::item::Query;
use crate::store::ItemStore;

/// Partition key for a session's ledger.
#[must_use]
pub fn ledger_pk(worker_id: &str) -> String {
    format!("token-{worker_id}")
}

/// Accumulated counters for one `(session, model)` pair.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Model id. Stored as the sort key, not as an attribute.
    #[serde(skip)]
    pub model_id: String,
    /// Uncached input tokens.
    pub input_tokens: u64,
    /// Output tokens.
    pub output_tokens: u64,
    /// Cache-read input tokens.
    pub cache_read_input_tokens: u64,
    /// Cache-write input tokens.
    pub cache_write_input_tokens: u64,
}

/// Repository over ledger entries.
#[derive(Clone)]
pub struct TokenLedger {
    store: Arc<dyn ItemStore>,
}

impl TokenLedger {
    /// Create a ledger over the given item store.
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    /// Add one response's usage to the `(worker, model)` counters.
    pub async fn add_usage(
        &self,
        worker_id: &str,
        model_id: &str,
        usage: &TokenUsage,
    ) -> Result<(), StoreError> {
        let pk = ledger_pk(worker_id);
        let current = self
            .store
            .get(&pk, model_id)
            .await?
            .map(|item| entry_from_attributes(model_id, &item.attributes))
            .transpose()?
            .unwrap_or_default();

        let mut set = Map::new();
        let _ = set.insert(
            "inputTokens".into(),
            Value::from(current.input_tokens + usage.input_tokens),
        );
        let _ = set.insert(
            "outputTokens".into(),
            Value::from(current.output_tokens + usage.output_tokens),
        );
        let _ = set.insert(
            "cacheReadInputTokens".into(),
            Value::from(current.cache_read_input_tokens + usage.cache_read_input_tokens),
        );
        let _ = set.insert(
            "cacheWriteInputTokens".into(),
            Value::from(current.cache_write_input_tokens + usage.cache_write_input_tokens),
        );
        self.store.update(&pk, model_id, set, None).await
    }

    /// All entries for a session.
    pub async fn list(&self, worker_id: &str) -> Result<Vec<LedgerEntry>, StoreError> {
        let items = self
            .store
            .query(&Query::partition(ledger_pk(worker_id)))
            .await?;
        items
            .into_iter()
            .map(|item| entry_from_attributes(&item.sk, &item.attributes))
            .collect()
    }
}

fn entry_from_attributes(
    model_id: &str,
    attributes: &Map<String, Value>,
) -> Result<LedgerEntry, StoreError> {
    let mut entry: LedgerEntry = serde_json::from_value(Value::Object(attributes.clone()))?;
    entry.model_id = model_id.to_owned();
    Ok(entry)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
