//! Durable state for agent sessions.
//!
//! Everything lives in one keyed table with a composite `(PK, SK)` key and a
//! single secondary ordering index (`LSI1`):
//!
//! - [`item`] / [`store`]: The item model and the [`store::ItemStore`] seam
//! - [`memory`]: Ordered-map backend for tests and embedding
//! - [`sqlite`]: File- or memory-backed `SQLite` backend
//! - [`messages`]: Append-only conversation log with billed-token attribution
//! - [`sessions`]: Session metadata (status, title, cost, visibility)
//! - [`ledger`]: Per-`(session, model)` token counters
//! - [`pricing`]: Price table and session cost rollup
//! - [`metadata`]: Small per-session scratch values set by tools

pub mod errors;
pub mod item;
pub mod ledger;
pub mod memory;
pub mod messages;
pub mod metadata;
pub mod pricing;
pub mod sessions;
pub mod sqlite;
pub mod store;

pub use errors::StoreError;
pub use item::{Item, Query};
pub use ledger::{LedgerEntry, TokenLedger};
pub use memory::MemoryItemStore;
pub use messages::MessageLog;
pub use metadata::MetadataStore;
pub use sessions::{AgentStatus, SessionPatch, SessionRecord, SessionStore};
pub use sqlite::SqliteItemStore;
pub use store::ItemStore;
