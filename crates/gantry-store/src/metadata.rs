//! Small per-session scratch values.
//!
//! Tools leave breadcrumbs here (`repo → { repoDirectory }`, todo lists,
//! the last progress-report timestamp). One partition per session
//! (`PK = "meta-" + workerId`), one item per key, a single `value`
//! attribute.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::errors::StoreError;
use crate::store::ItemStore;

/// Partition key for a session's metadata.
#[must_use]
pub fn metadata_pk(worker_id: &str) -> String {
    format!("meta-{worker_id}")
}

/// Repository over metadata values.
#[derive(Clone)]
pub struct MetadataStore {
    store: Arc<dyn ItemStore>,
}

impl MetadataStore {
    /// Create a metadata store over the given item store.
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    /// Write one value.
    pub async fn set(&self, worker_id: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let mut set = Map::new();
        let _ = set.insert("value".into(), value);
        self.store
            .update(&metadata_pk(worker_id), key, set, None)
            .await
    }

    /// Read one value.
    pub async fn get(&self, worker_id: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let item = self.store.get(&metadata_pk(worker_id), key).await?;
        Ok(item.and_then(|i| i.attributes.get("value").cloned()))
    }

    /// The cloned repository directory, when a clone tool recorded one.
    pub async fn repo_directory(&self, worker_id: &str) -> Result<Option<String>, StoreError> {
        let value = self.get(worker_id, "repo").await?;
        Ok(value
            .and_then(|v| v.get("repoDirectory").cloned())
            .and_then(|v| v.as_str().map(str::to_owned)))
    }

    /// Record the cloned repository directory.
    pub async fn set_repo_directory(
        &self,
        worker_id: &str,
        directory: &str,
    ) -> Result<(), StoreError> {
        self.set(
            worker_id,
            "repo",
            serde_json::json!({ "repoDirectory": directory }),
        )
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
