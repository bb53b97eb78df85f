//! Append-only conversation log.
//!
//! One partition per session (`PK = workerId`), one item per message, sort
//! keys strictly increasing. A `toolUse` item is never persisted without its
//! matching `toolResult` item — the pair goes through one transaction.
//!
//! Token counts are incremental: when a provider reports billed input
//! tokens, the difference against the sum already on file is attributed to
//! the last user-role item, so truncation decisions work from real billed
//! numbers instead of estimates.

use std::sync::Arc;

use serde_json::{Map, Value};

use gantry_core::messages::MessageItem;

use crate::errors::StoreError;
use crate::item::{Item, Query};
use crate::store::ItemStore;

/// Width of the zero-padded numeric sort key.
const SORT_KEY_WIDTH: usize = 10;

/// The conversation log for all sessions in one table.
#[derive(Clone)]
pub struct MessageLog {
    store: Arc<dyn ItemStore>,
}

impl MessageLog {
    /// Create a log over the given item store.
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    /// Append one item, allocating the next sort key. Returns the key.
    pub async fn append(
        &self,
        worker_id: &str,
        mut item: MessageItem,
    ) -> Result<String, StoreError> {
        let sk = self.next_sort_key(worker_id, 1).await?;
        item.sk.clone_from(&sk);
        self.store.put(to_item(worker_id, &item)?).await?;
        Ok(sk)
    }

    /// Append a `toolUse`/`toolResult` pair atomically.
    ///
    /// `output_tokens` (the assistant's generation cost) and the optional
    /// reasoning budget are recorded on the `toolUse` item. Returns both
    /// sort keys.
    pub async fn append_pair(
        &self,
        worker_id: &str,
        mut tool_use: MessageItem,
        mut tool_result: MessageItem,
        output_tokens: i64,
        thinking_budget: Option<u32>,
    ) -> Result<(String, String), StoreError> {
        tool_use.token_count = output_tokens;
        tool_use.thinking_budget = thinking_budget;

        let first = self.next_sort_key(worker_id, 1).await?;
        let second = self.next_sort_key(worker_id, 2).await?;
        tool_use.sk.clone_from(&first);
        tool_result.sk.clone_from(&second);

        self.store
            .transact_put(vec![
                to_item(worker_id, &tool_use)?,
                to_item(worker_id, &tool_result)?,
            ])
            .await?;
        Ok((first, second))
    }

    /// All items for a session, oldest first.
    pub async fn list(&self, worker_id: &str) -> Result<Vec<MessageItem>, StoreError> {
        let items = self.store.query(&Query::partition(worker_id)).await?;
        items.into_iter().map(from_item).collect()
    }

    /// The most recent item, if any.
    pub async fn last(&self, worker_id: &str) -> Result<Option<MessageItem>, StoreError> {
        let items = self
            .store
            .query(&Query::partition(worker_id).newest_first().with_limit(1))
            .await?;
        items.into_iter().next().map(from_item).transpose()
    }

    /// Overwrite the `tokenCount` field of one item.
    pub async fn update_token_count(
        &self,
        worker_id: &str,
        sk: &str,
        token_count: i64,
    ) -> Result<(), StoreError> {
        let mut set = Map::new();
        let _ = set.insert("tokenCount".into(), Value::from(token_count));
        self.store.update(worker_id, sk, set, None).await
    }

    /// Allocate the sort key `offset` positions past the current tail.
    async fn next_sort_key(&self, worker_id: &str, offset: u64) -> Result<String, StoreError> {
        let tail = self
            .store
            .query(&Query::partition(worker_id).newest_first().with_limit(1))
            .await?;
        let last = tail
            .first()
            .and_then(|item| item.sk.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(format!("{:0width$}", last + offset, width = SORT_KEY_WIDTH))
    }
}

fn to_item(worker_id: &str, message: &MessageItem) -> Result<Item, StoreError> {
    let value = serde_json::to_value(message)?;
    let attributes = value
        .as_object()
        .cloned()
        .ok_or_else(|| StoreError::Corrupt {
            pk: worker_id.to_owned(),
            sk: message.sk.clone(),
            message: "message did not serialize to an object".into(),
        })?;
    Ok(Item::new(worker_id, message.sk.clone()).with_attributes(attributes))
}

fn from_item(item: Item) -> Result<MessageItem, StoreError> {
    let mut message: MessageItem = serde_json::from_value(Value::Object(item.attributes.clone()))
        .map_err(|e| StoreError::Corrupt {
            pk: item.pk.clone(),
            sk: item.sk.clone(),
            message: e.to_string(),
        })?;
    message.sk = item.sk;
    Ok(message)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
