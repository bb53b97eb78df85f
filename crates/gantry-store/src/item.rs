//! The keyed item model.
//!
//! Every record is an [`Item`]: a composite `(pk, sk)` key, an optional
//! `lsi1` secondary ordering key, and a JSON attribute map. Queries address
//! one partition and order by either the sort key or `lsi1`.

use serde_json::{Map, Value};

/// One stored record.
#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    /// Partition key.
    pub pk: String,
    /// Sort key — unique within the partition, ordering key by default.
    pub sk: String,
    /// Secondary ordering key for the `LSI1` index. Items without it are
    /// invisible to `LSI1` queries.
    pub lsi1: Option<String>,
    /// Attribute map.
    pub attributes: Map<String, Value>,
}

impl Item {
    /// Create an item with empty attributes.
    #[must_use]
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
            lsi1: None,
            attributes: Map::new(),
        }
    }

    /// Set the `LSI1` ordering key.
    #[must_use]
    pub fn with_lsi1(mut self, lsi1: impl Into<String>) -> Self {
        self.lsi1 = Some(lsi1.into());
        self
    }

    /// Set the attribute map.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Read one attribute.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// A single-partition query.
#[derive(Clone, Debug)]
pub struct Query {
    /// Partition to read.
    pub pk: String,
    /// Order by `lsi1` instead of the sort key.
    pub index_lsi1: bool,
    /// Ascending order when `true`, descending otherwise.
    pub scan_forward: bool,
    /// Maximum items to return; `None` reads the whole partition.
    pub limit: Option<usize>,
    /// Inclusive bounds on the ordering key.
    pub range: Option<(String, String)>,
}

impl Query {
    /// Query a partition in ascending sort-key order, unbounded.
    #[must_use]
    pub fn partition(pk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            index_lsi1: false,
            scan_forward: true,
            limit: None,
            range: None,
        }
    }

    /// Order by the `LSI1` index.
    #[must_use]
    pub fn on_lsi1(mut self) -> Self {
        self.index_lsi1 = true;
        self
    }

    /// Descending order (newest first for time-ordered keys).
    #[must_use]
    pub fn newest_first(mut self) -> Self {
        self.scan_forward = false;
        self
    }

    /// Cap the number of returned items.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Restrict the ordering key to an inclusive range.
    #[must_use]
    pub fn with_range(mut self, low: impl Into<String>, high: impl Into<String>) -> Self {
        self.range = Some((low.into(), high.into()));
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
