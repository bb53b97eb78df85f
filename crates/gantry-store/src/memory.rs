//! In-memory item store.
//!
//! An ordered map behind a lock. Used by the test suites and available for
//! embedding; semantics match the `SQLite` backend exactly.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::errors::StoreError;
use crate::item::{Item, Query};
use crate::store::ItemStore;

/// Item store over an in-process ordered map.
#[derive(Default)]
pub struct MemoryItemStore {
    items: RwLock<BTreeMap<(String, String), Item>>,
}

impl MemoryItemStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items, across all partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns `true` if no items are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

fn ordering_key<'a>(item: &'a Item, index_lsi1: bool) -> Option<&'a str> {
    if index_lsi1 {
        item.lsi1.as_deref()
    } else {
        Some(item.sk.as_str())
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>, StoreError> {
        Ok(self
            .items
            .read()
            .get(&(pk.to_owned(), sk.to_owned()))
            .cloned())
    }

    async fn put(&self, item: Item) -> Result<(), StoreError> {
        let _ = self
            .items
            .write()
            .insert((item.pk.clone(), item.sk.clone()), item);
        Ok(())
    }

    async fn update(
        &self,
        pk: &str,
        sk: &str,
        set: Map<String, Value>,
        lsi1: Option<String>,
    ) -> Result<(), StoreError> {
        let mut items = self.items.write();
        let entry = items
            .entry((pk.to_owned(), sk.to_owned()))
            .or_insert_with(|| Item::new(pk, sk));
        for (key, value) in set {
            let _ = entry.attributes.insert(key, value);
        }
        if lsi1.is_some() {
            entry.lsi1 = lsi1;
        }
        Ok(())
    }

    async fn transact_put(&self, to_write: Vec<Item>) -> Result<(), StoreError> {
        // Single lock acquisition makes the batch atomic to readers.
        let mut items = self.items.write();
        for item in to_write {
            let _ = items.insert((item.pk.clone(), item.sk.clone()), item);
        }
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Item>, StoreError> {
        let items = self.items.read();
        let mut matched: Vec<Item> = items
            .range((query.pk.clone(), String::new())..)
            .take_while(|((pk, _), _)| *pk == query.pk)
            .filter_map(|(_, item)| {
                let key = ordering_key(item, query.index_lsi1)?;
                if let Some((low, high)) = &query.range {
                    if key < low.as_str() || key > high.as_str() {
                        return None;
                    }
                }
                Some(item.clone())
            })
            .collect();

        matched.sort_by(|a, b| {
            let ka = ordering_key(a, query.index_lsi1).unwrap_or_default();
            let kb = ordering_key(b, query.index_lsi1).unwrap_or_default();
            ka.cmp(kb)
        });
        if !query.scan_forward {
            matched.reverse();
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
