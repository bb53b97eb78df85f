//! The item store seam.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::StoreError;
use crate::item::{Item, Query};

/// Keyed storage shared by every repository.
///
/// `update` merges the given attributes into the item, creating it when
/// absent (upsert semantics). `transact_put` persists all items or none —
/// the message log relies on it to keep `toolUse`/`toolResult` pairs atomic.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Fetch one item by key.
    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>, StoreError>;

    /// Write one item, replacing any existing item with the same key.
    async fn put(&self, item: Item) -> Result<(), StoreError>;

    /// Merge attributes into an item, creating it when absent. When `lsi1`
    /// is given, the secondary ordering key is rewritten too.
    async fn update(
        &self,
        pk: &str,
        sk: &str,
        set: Map<String, Value>,
        lsi1: Option<String>,
    ) -> Result<(), StoreError>;

    /// Write all items in one transaction.
    async fn transact_put(&self, items: Vec<Item>) -> Result<(), StoreError>;

    /// Read items from one partition in the requested order.
    async fn query(&self, query: &Query) -> Result<Vec<Item>, StoreError>;
}
