// src/store/sqlite.rs
//! Durable document store on SQLite.
//!
//! - Owns a single connection (WAL) behind a mutex; one writer per process.
//! - Every collection shares one `documents` table keyed by
//!   `(collection, owner, id)`; payloads are JSON text.
//! - `transact` runs inside an IMMEDIATE transaction so concurrent writers
//!   from other connections serialize. A busy database is retried a bounded
//!   number of times, then reported as a conflict.

use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior, params};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

use super::{Collection, Document, DocumentStore, StoreError, UpdateFn, Ordering, sort_key, with_id};
use crate::config::StoreConfig;

pub struct SqliteStore {
    db: Mutex<Connection>,
    max_conflict_retries: u32,
}

impl SqliteStore {
    /// Open/create the database file and ensure the schema.
    pub fn open(path: &Path, busy_timeout: Duration, max_conflict_retries: u32) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("{}: {e}", parent.display())))?;
        }
        let db = Connection::open(path)?;
        db.busy_timeout(busy_timeout)?;
        Self::init_schema(&db)?;
        Ok(Self {
            db: Mutex::new(db),
            max_conflict_retries,
        })
    }

    pub fn from_config(cfg: &StoreConfig) -> Result<Self, StoreError> {
        Self::open(
            &cfg.sqlite_path,
            Duration::from_millis(cfg.busy_timeout_ms),
            cfg.max_conflict_retries,
        )
    }

    /// Private in-memory database, handy for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = Connection::open_in_memory()?;
        Self::init_schema(&db)?;
        Ok(Self {
            db: Mutex::new(db),
            max_conflict_retries: 0,
        })
    }

    fn init_schema(db: &Connection) -> Result<(), StoreError> {
        db.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS documents (
              seq         INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order
              collection  TEXT NOT NULL,
              owner       TEXT NOT NULL,                      -- contributor key or 'global'
              id          TEXT NOT NULL,
              sort_ms     INTEGER NOT NULL,                   -- display ordering key
              data        TEXT NOT NULL,                      -- JSON payload incl. id
              updated_at  TEXT NOT NULL,                      -- RFC3339 UTC
              UNIQUE(collection, owner, id)
            );

            CREATE INDEX IF NOT EXISTS idx_doc_scope ON documents(collection, owner, sort_ms);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked
    )
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, i64, i64, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn to_document((id, seq, sort_ms, data): (String, i64, i64, String)) -> Result<Document, StoreError> {
    Ok(Document {
        id,
        seq: seq.max(0) as u64,
        sort_ms,
        data: serde_json::from_str(&data)?,
    })
}

fn select_one(
    conn: &Connection,
    collection: Collection,
    owner: &str,
    id: &str,
) -> Result<Option<Document>, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, seq, sort_ms, data FROM documents
             WHERE collection = ?1 AND owner = ?2 AND id = ?3",
            params![collection.name(), owner, id],
            read_row,
        )
        .optional()?;
    row.map(to_document).transpose()
}

/// Insert or replace; an existing row keeps its `seq` and, for collections
/// ordered by creation, its `sort_ms`.
fn upsert(
    conn: &Connection,
    collection: Collection,
    owner: &str,
    id: &str,
    data: Value,
) -> Result<Document, StoreError> {
    let data = with_id(data, id);
    let now = Utc::now();
    let sort_ms = sort_key(collection, &data, now.timestamp_millis());
    let text = serde_json::to_string(&data)?;
    let keep_created = collection.sort_field().is_none();
    conn.execute(
        r#"
        INSERT INTO documents(collection, owner, id, sort_ms, data, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(collection, owner, id) DO UPDATE SET
          sort_ms    = CASE WHEN ?7 THEN documents.sort_ms ELSE excluded.sort_ms END,
          data       = excluded.data,
          updated_at = excluded.updated_at
        "#,
        params![
            collection.name(),
            owner,
            id,
            sort_ms,
            text,
            now.to_rfc3339(),
            keep_created
        ],
    )?;
    select_one(conn, collection, owner, id)?
        .ok_or_else(|| StoreError::Unavailable(format!("{collection}/{id} vanished after write")))
}

impl DocumentStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn list(&self, collection: Collection, owner: &str) -> Result<Vec<Document>, StoreError> {
        let owner = collection.scope(owner);
        let conn = self.lock()?;
        let sql = match collection.ordering() {
            Ordering::Insertion => {
                "SELECT id, seq, sort_ms, data FROM documents
                 WHERE collection = ?1 AND owner = ?2 ORDER BY seq ASC"
            }
            Ordering::NewestFirst => {
                "SELECT id, seq, sort_ms, data FROM documents
                 WHERE collection = ?1 AND owner = ?2 ORDER BY sort_ms DESC, seq DESC"
            }
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![collection.name(), owner], read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.0.clone();
                match to_document(row) {
                    Ok(doc) => Some(doc),
                    Err(err) => {
                        tracing::warn!(collection = collection.name(), id = %id, error = %err, "skipping unreadable row");
                        None
                    }
                }
            })
            .collect())
    }

    fn get(
        &self,
        collection: Collection,
        owner: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let conn = self.lock()?;
        select_one(&conn, collection, collection.scope(owner), id)
    }

    fn insert(
        &self,
        collection: Collection,
        owner: &str,
        data: Value,
    ) -> Result<Document, StoreError> {
        let id = format!("{}-{}", collection.id_prefix(), Uuid::new_v4().simple());
        let conn = self.lock()?;
        upsert(&conn, collection, collection.scope(owner), &id, data)
    }

    fn put(
        &self,
        collection: Collection,
        owner: &str,
        id: &str,
        data: Value,
    ) -> Result<Document, StoreError> {
        let conn = self.lock()?;
        upsert(&conn, collection, collection.scope(owner), id, data)
    }

    fn transact(
        &self,
        collection: Collection,
        owner: &str,
        id: &str,
        update: &mut UpdateFn<'_>,
    ) -> Result<Option<Document>, StoreError> {
        let owner = collection.scope(owner);
        let mut conn = self.lock()?;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match run_transaction(&mut conn, collection, owner, id, update) {
                Err(StoreError::Sqlite(err)) if is_busy(&err) => {
                    if attempts > self.max_conflict_retries {
                        return Err(StoreError::Conflict {
                            collection: collection.name(),
                            id: id.to_string(),
                            attempts,
                        });
                    }
                    tracing::debug!(collection = collection.name(), id, attempts, "sqlite busy; retrying transaction");
                }
                other => return other,
            }
        }
    }
}

fn run_transaction(
    conn: &mut Connection,
    collection: Collection,
    owner: &str,
    id: &str,
    update: &mut UpdateFn<'_>,
) -> Result<Option<Document>, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = select_one(&tx, collection, owner, id)?.map(|d| d.data);
    let written = match update(current)? {
        Some(next) => Some(upsert(&tx, collection, owner, id, next)?),
        None => None,
    };
    tx.commit()?;
    Ok(written)
}
