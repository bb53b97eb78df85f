//! Session metadata.
//!
//! All sessions share one partition (`PK = "sessions"`, `SK = workerId`).
//! `LSI1` holds the zero-padded `updatedAt` so listing is a reverse index
//! walk. Deletion is soft: hidden sessions stay on disk but vanish from
//! listings.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::StoreError;
use crate::item::{Item, Query};
use crate::store::ItemStore;

/// Partition key shared by all session records.
pub const SESSIONS_PK: &str = "sessions";

/// Width of the zero-padded `updatedAt` ordering key.
const LSI1_WIDTH: usize = 15;

/// What the agent loop is doing for this session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Idle, waiting for a message.
    Pending,
    /// A turn is in progress.
    Working,
    /// A cancel was requested; the loop is unwinding.
    Cancelling,
}

/// One session record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Session id. Stored as the sort key, not as an attribute.
    #[serde(skip)]
    pub worker_id: String,
    /// Loop status.
    pub agent_status: AgentStatus,
    /// Display title, at most 15 characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Creation time, epoch milliseconds.
    pub created_at: i64,
    /// Last mutation time, epoch milliseconds.
    pub updated_at: i64,
    /// Soft-deleted flag.
    pub is_hidden: bool,
    /// Accumulated cost in USD.
    pub cost: f64,
    /// Who started the session.
    pub initiator: String,
    /// Slack user behind the session, when it came from Slack.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack_user_id: Option<String>,
    /// Custom agent definition in effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_agent_id: Option<String>,
    /// Session-wide model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_override: Option<String>,
}

impl SessionRecord {
    /// Create a fresh pending session.
    #[must_use]
    pub fn new(worker_id: impl Into<String>, initiator: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            worker_id: worker_id.into(),
            agent_status: AgentStatus::Pending,
            title: None,
            created_at: now,
            updated_at: now,
            is_hidden: false,
            cost: 0.0,
            initiator: initiator.into(),
            slack_user_id: None,
            custom_agent_id: None,
            model_override: None,
        }
    }
}

/// Partial session update. Unset fields are left untouched.
#[derive(Clone, Debug, Default)]
pub struct SessionPatch {
    /// New loop status.
    pub agent_status: Option<AgentStatus>,
    /// New title.
    pub title: Option<String>,
    /// New visibility.
    pub is_hidden: Option<bool>,
    /// New accumulated cost.
    pub cost: Option<f64>,
    /// New model override.
    pub model_override: Option<String>,
}

/// Repository over session records.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn ItemStore>,
}

impl SessionStore {
    /// Create a session store over the given item store.
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    /// Persist a new session record.
    pub async fn create(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        let attributes = value
            .as_object()
            .cloned()
            .ok_or_else(|| StoreError::Corrupt {
                pk: SESSIONS_PK.into(),
                sk: record.worker_id.clone(),
                message: "session did not serialize to an object".into(),
            })?;
        let item = Item::new(SESSIONS_PK, record.worker_id.clone())
            .with_lsi1(ordering_key(record.updated_at))
            .with_attributes(attributes);
        self.store.put(item).await
    }

    /// Fetch a session by id.
    pub async fn get(&self, worker_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let item = self.store.get(SESSIONS_PK, worker_id).await?;
        item.map(from_item).transpose()
    }

    /// Fetch a session, erroring when absent.
    pub async fn get_required(&self, worker_id: &str) -> Result<SessionRecord, StoreError> {
        self.get(worker_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                pk: SESSIONS_PK.into(),
                sk: worker_id.to_owned(),
            })
    }

    /// List visible sessions, newest first.
    ///
    /// `limit = 0` pages through the whole partition; otherwise a single
    /// query capped at `limit`. `range` bounds `updatedAt` (epoch millis,
    /// inclusive).
    pub async fn list(
        &self,
        limit: usize,
        range: Option<(i64, i64)>,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        let mut query = Query::partition(SESSIONS_PK).on_lsi1().newest_first();
        if limit > 0 {
            query = query.with_limit(limit);
        }
        if let Some((low, high)) = range {
            query = query.with_range(ordering_key(low), ordering_key(high));
        }
        let items = self.store.query(&query).await?;
        let mut sessions = Vec::with_capacity(items.len());
        for item in items {
            let record = from_item(item)?;
            if !record.is_hidden {
                sessions.push(record);
            }
        }
        Ok(sessions)
    }

    /// Apply a partial update. Always refreshes `updatedAt` and the listing
    /// index.
    pub async fn update(&self, worker_id: &str, patch: SessionPatch) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut set = Map::new();
        if let Some(status) = patch.agent_status {
            let _ = set.insert("agentStatus".into(), serde_json::to_value(status)?);
        }
        if let Some(title) = patch.title {
            let _ = set.insert("title".into(), Value::String(title));
        }
        if let Some(hidden) = patch.is_hidden {
            let _ = set.insert("isHidden".into(), Value::Bool(hidden));
        }
        if let Some(cost) = patch.cost {
            let _ = set.insert("cost".into(), Value::from(cost));
        }
        if let Some(model) = patch.model_override {
            let _ = set.insert("modelOverride".into(), Value::String(model));
        }
        let _ = set.insert("updatedAt".into(), Value::from(now));
        self.store
            .update(SESSIONS_PK, worker_id, set, Some(ordering_key(now)))
            .await
    }

    /// Set the loop status.
    pub async fn update_status(
        &self,
        worker_id: &str,
        status: AgentStatus,
    ) -> Result<(), StoreError> {
        self.update(
            worker_id,
            SessionPatch {
                agent_status: Some(status),
                ..SessionPatch::default()
            },
        )
        .await
    }

    /// Set the display title.
    pub async fn update_title(&self, worker_id: &str, title: &str) -> Result<(), StoreError> {
        self.update(
            worker_id,
            SessionPatch {
                title: Some(title.to_owned()),
                ..SessionPatch::default()
            },
        )
        .await
    }

    /// Set the soft-delete flag.
    pub async fn update_visibility(
        &self,
        worker_id: &str,
        is_hidden: bool,
    ) -> Result<(), StoreError> {
        self.update(
            worker_id,
            SessionPatch {
                is_hidden: Some(is_hidden),
                ..SessionPatch::default()
            },
        )
        .await
    }
}

fn ordering_key(updated_at: i64) -> String {
    format!("{:0width$}", updated_at.max(0), width = LSI1_WIDTH)
}

fn from_item(item: Item) -> Result<SessionRecord, StoreError> {
    let mut record: SessionRecord = serde_json::from_value(Value::Object(item.attributes.clone()))
        .map_err(|e| StoreError::Corrupt {
            pk: item.pk.clone(),
            sk: item.sk.clone(),
            message: e.to_string(),
        })?;
    record.worker_id = item.sk;
    Ok(record)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryItemStore;

    fn sessions() -> SessionStore {
        SessionStore::new(Arc::new(MemoryItemStore::new()))
    }

    // -- create / get --

    #[tokio::test]
    async fn create_and_get() {
        let store = sessions();
        store
            .create(&SessionRecord::new("w-1", "slack"))
            .await
            .unwrap();
        let record = store.get("w-1").await.unwrap().unwrap();
        assert_eq!(record.worker_id, "w-1");
        assert_eq!(record.agent_status, AgentStatus::Pending);
        assert_eq!(record.initiator, "slack");
        assert!(!record.is_hidden);
        assert!(record.title.is_none());
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        assert!(sessions().get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_required_errors_when_absent() {
        let err = sessions().get_required("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    // -- updates --

    #[tokio::test]
    async fn update_status_transitions() {
        let store = sessions();
        store
            .create(&SessionRecord::new("w-1", "web"))
            .await
            .unwrap();
        store
            .update_status("w-1", AgentStatus::Working)
            .await
            .unwrap();
        assert_eq!(
            store.get("w-1").await.unwrap().unwrap().agent_status,
            AgentStatus::Working
        );
        store
            .update_status("w-1", AgentStatus::Pending)
            .await
            .unwrap();
        assert_eq!(
            store.get("w-1").await.unwrap().unwrap().agent_status,
            AgentStatus::Pending
        );
    }

    #[tokio::test]
    async fn update_title_preserves_other_fields() {
        let store = sessions();
        store
            .create(&SessionRecord::new("w-1", "web"))
            .await
            .unwrap();
        store.update_title("w-1", "Fix the CI").await.unwrap();
        let record = store.get("w-1").await.unwrap().unwrap();
        assert_eq!(record.title.as_deref(), Some("Fix the CI"));
        assert_eq!(record.initiator, "web");
    }

    #[tokio::test]
    async fn update_refreshes_updated_at() {
        let store = sessions();
        let mut record = SessionRecord::new("w-1", "web");
        record.updated_at = 1000;
        record.created_at = 1000;
        store.create(&record).await.unwrap();
        store
            .update(
                "w-1",
                SessionPatch {
                    cost: Some(0.5),
                    ..SessionPatch::default()
                },
            )
            .await
            .unwrap();
        let after = store.get("w-1").await.unwrap().unwrap();
        assert!(after.updated_at > 1000);
        assert!((after.cost - 0.5).abs() < f64::EPSILON);
    }

    // -- listing --

    #[tokio::test]
    async fn list_newest_first() {
        let store = sessions();
        let mut a = SessionRecord::new("w-a", "x");
        a.updated_at = 1_000;
        let mut b = SessionRecord::new("w-b", "x");
        b.updated_at = 2_000;
        store.create(&a).await.unwrap();
        store.create(&b).await.unwrap();

        let listed = store.list(10, None).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|s| s.worker_id.as_str()).collect();
        assert_eq!(ids, ["w-b", "w-a"]);
    }

    #[tokio::test]
    async fn list_filters_hidden() {
        let store = sessions();
        store
            .create(&SessionRecord::new("w-a", "x"))
            .await
            .unwrap();
        store
            .create(&SessionRecord::new("w-b", "x"))
            .await
            .unwrap();
        store.update_visibility("w-a", true).await.unwrap();
        let listed = store.list(10, None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].worker_id, "w-b");
    }

    #[tokio::test]
    async fn list_zero_limit_scans_all() {
        let store = sessions();
        for i in 0..25 {
            store
                .create(&SessionRecord::new(format!("w-{i:02}"), "x"))
                .await
                .unwrap();
        }
        let listed = store.list(0, None).await.unwrap();
        assert_eq!(listed.len(), 25);
    }

    #[tokio::test]
    async fn list_respects_limit_and_range() {
        let store = sessions();
        for (id, at) in [("w-a", 1_000_i64), ("w-b", 2_000), ("w-c", 3_000)] {
            let mut record = SessionRecord::new(id, "x");
            record.updated_at = at;
            store.create(&record).await.unwrap();
        }
        let listed = store.list(10, Some((1_500, 2_500))).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].worker_id, "w-b");

        let limited = store.list(2, None).await.unwrap();
        assert_eq!(limited.len(), 2);
    }
}
