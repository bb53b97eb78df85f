//! `SQLite`-backed item store.
//!
//! One `items` table with `(pk, sk)` as the primary key and a `(pk, lsi1)`
//! index standing in for `LSI1`. Connections come from an `r2d2` pool with
//! WAL mode and a busy timeout set on acquisition.

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use crate::errors::StoreError;
use crate::item::{Item, Query};
use crate::store::ItemStore;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS items (
    pk TEXT NOT NULL,
    sk TEXT NOT NULL,
    lsi1 TEXT,
    attributes TEXT NOT NULL,
    PRIMARY KEY (pk, sk)
);
CREATE INDEX IF NOT EXISTS idx_items_lsi1 ON items (pk, lsi1);
";

/// Pragmas applied to each new connection.
#[derive(Debug)]
struct PragmaCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = 30000;\
             PRAGMA synchronous = NORMAL;",
        )
    }
}

/// Item store over a pooled `SQLite` database.
pub struct SqliteItemStore {
    pool: ConnectionPool,
}

impl SqliteItemStore {
    /// Open (or create) a file-backed store.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(8)
            .connection_customizer(Box::new(PragmaCustomizer))
            .build(manager)?;
        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory store.
    ///
    /// The pool is capped at a single connection so every caller sees the
    /// same in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .connection_customizer(Box::new(PragmaCustomizer))
            .build(manager)?;
        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn row_to_item(
        pk: String,
        sk: String,
        lsi1: Option<String>,
        attributes: &str,
    ) -> Result<Item, StoreError> {
        let parsed: Value = serde_json::from_str(attributes).map_err(|e| StoreError::Corrupt {
            pk: pk.clone(),
            sk: sk.clone(),
            message: e.to_string(),
        })?;
        let attributes = parsed
            .as_object()
            .cloned()
            .ok_or_else(|| StoreError::Corrupt {
                pk: pk.clone(),
                sk: sk.clone(),
                message: "attributes are not a JSON object".into(),
            })?;
        Ok(Item {
            pk,
            sk,
            lsi1,
            attributes,
        })
    }

    fn put_on(conn: &Connection, item: &Item) -> Result<(), StoreError> {
        let attributes = serde_json::to_string(&item.attributes)?;
        let _ = conn.execute(
            "INSERT INTO items (pk, sk, lsi1, attributes) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (pk, sk) DO UPDATE SET lsi1 = ?3, attributes = ?4",
            params![item.pk, item.sk, item.lsi1, attributes],
        )?;
        Ok(())
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>, StoreError> {
        let conn = self.pool.get()?;
        let row: Option<(Option<String>, String)> = conn
            .query_row(
                "SELECT lsi1, attributes FROM items WHERE pk = ?1 AND sk = ?2",
                params![pk, sk],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            Some((lsi1, attributes)) => Ok(Some(Self::row_to_item(
                pk.to_owned(),
                sk.to_owned(),
                lsi1,
                &attributes,
            )?)),
            None => Ok(None),
        }
    }

    async fn put(&self, item: Item) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        Self::put_on(&conn, &item)
    }

    async fn update(
        &self,
        pk: &str,
        sk: &str,
        set: Map<String, Value>,
        lsi1: Option<String>,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let existing: Option<(Option<String>, String)> = tx
            .query_row(
                "SELECT lsi1, attributes FROM items WHERE pk = ?1 AND sk = ?2",
                params![pk, sk],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let mut item = match existing {
            Some((old_lsi1, attributes)) => {
                Self::row_to_item(pk.to_owned(), sk.to_owned(), old_lsi1, &attributes)?
            }
            None => Item::new(pk, sk),
        };
        for (key, value) in set {
            let _ = item.attributes.insert(key, value);
        }
        if lsi1.is_some() {
            item.lsi1 = lsi1;
        }
        Self::put_on(&tx, &item)?;
        tx.commit()?;
        Ok(())
    }

    async fn transact_put(&self, items: Vec<Item>) -> Result<(), StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        for item in &items {
            Self::put_on(&tx, item)?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Item>, StoreError> {
        use std::fmt::Write;

        let order_col = if query.index_lsi1 { "lsi1" } else { "sk" };
        let mut sql = String::from("SELECT pk, sk, lsi1, attributes FROM items WHERE pk = ?1");
        if query.index_lsi1 {
            sql.push_str(" AND lsi1 IS NOT NULL");
        }
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(query.pk.clone())];
        if let Some((low, high)) = &query.range {
            let _ = write!(
                sql,
                " AND {order_col} >= ?{} AND {order_col} <= ?{}",
                param_values.len() + 1,
                param_values.len() + 2
            );
            param_values.push(Box::new(low.clone()));
            param_values.push(Box::new(high.clone()));
        }
        let direction = if query.scan_forward { "ASC" } else { "DESC" };
        let _ = write!(sql, " ORDER BY {order_col} {direction}");
        if let Some(limit) = query.limit {
            let _ = write!(sql, " LIMIT {limit}");
        }

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(Box::as_ref).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(pk, sk, lsi1, attributes)| Self::row_to_item(pk, sk, lsi1, &attributes))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
