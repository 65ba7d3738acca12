use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::ids::sequence::block_end;
use crate::ids::{SequenceAllocator, SequenceError};

pub const DB_FILE: &str = "vspd.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(workspace.join(DB_FILE))?;
    // Several sidecars may share one workspace; let writers queue instead of failing.
    conn.busy_timeout(Duration::from_secs(5))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS id_sequences(
            key TEXT PRIMARY KEY,
            last_seq INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS issued_ids(
            id TEXT PRIMARY KEY,
            identifier TEXT NOT NULL UNIQUE,
            kind TEXT NOT NULL,
            format TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_issued_ids_kind ON issued_ids(kind, created_at)",
        [],
    )?;

    Ok(conn)
}

/// Counters kept in the workspace database. Every reservation is one
/// immediate transaction, so separate processes on the same file never hand
/// out the same number.
pub struct SqliteAllocator {
    conn: Mutex<Connection>,
}

impl SqliteAllocator {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            conn: Mutex::new(open_db(workspace)?),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T, SequenceError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| SequenceError::Store("sequence connection lock poisoned".to_string()))?;
        f(&mut conn).map_err(|e| SequenceError::Store(e.to_string()))
    }
}

fn read_last(conn: &Connection, key: &str) -> rusqlite::Result<u32> {
    Ok(conn
        .query_row(
            "SELECT last_seq FROM id_sequences WHERE key = ?",
            [key],
            |r| r.get::<_, u32>(0),
        )
        .optional()?
        .unwrap_or(0))
}

fn write_last(conn: &Connection, key: &str, value: u32) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO id_sequences(key, last_seq) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET last_seq = excluded.last_seq",
        (key, value),
    )?;
    Ok(())
}

impl SequenceAllocator for SqliteAllocator {
    fn reserve(&self, key: &str, count: u32, max: u32) -> Result<u32, SequenceError> {
        let mut refused = None;
        let first = self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let last = read_last(&tx, key)?;
            let end = match block_end(key, last, count, max) {
                Ok(end) => end,
                Err(e) => {
                    // Dropping the transaction rolls it back.
                    refused = Some(e);
                    return Ok(0);
                }
            };
            write_last(&tx, key, end)?;
            tx.commit()?;
            Ok(last + 1)
        })?;
        match refused {
            Some(e) => Err(e),
            None => Ok(first),
        }
    }

    fn current(&self, key: &str) -> Result<u32, SequenceError> {
        self.with_conn(|conn| read_last(conn, key))
    }

    fn seed(&self, key: &str, value: u32) -> Result<(), SequenceError> {
        self.with_conn(|conn| write_last(conn, key, value))
    }

    fn reset(&self) -> Result<(), SequenceError> {
        self.with_conn(|conn| conn.execute("DELETE FROM id_sequences", []).map(|_| ()))
    }

    fn kind(&self) -> &'static str {
        "sqlite"
    }
}

#[derive(Debug)]
pub enum RecordError {
    Duplicate(String),
    Db(rusqlite::Error),
}

impl From<rusqlite::Error> for RecordError {
    fn from(e: rusqlite::Error) -> Self {
        RecordError::Db(e)
    }
}

/// Records freshly issued identifiers. All-or-nothing: one collision rolls
/// back the whole batch.
pub fn record_issued(
    conn: &Connection,
    kind: &str,
    format: &str,
    identifiers: &[String],
) -> Result<(), RecordError> {
    let tx = conn.unchecked_transaction()?;
    let created_at = chrono::Utc::now().to_rfc3339();
    {
        let mut stmt = tx.prepare(
            "INSERT INTO issued_ids(id, identifier, kind, format, created_at)
             VALUES(?, ?, ?, ?, ?)",
        )?;
        for identifier in identifiers {
            let row_id = Uuid::new_v4().to_string();
            if let Err(e) = stmt.execute((&row_id, identifier, kind, format, &created_at)) {
                if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
                    return Err(RecordError::Duplicate(identifier.clone()));
                }
                return Err(e.into());
            }
        }
    }
    tx.commit()?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedRow {
    pub id: String,
    pub identifier: String,
    pub kind: String,
    pub format: String,
    pub created_at: String,
}

pub fn list_issued(
    conn: &Connection,
    kind: Option<&str>,
    limit: i64,
) -> rusqlite::Result<Vec<IssuedRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, identifier, kind, format, created_at
         FROM issued_ids
         WHERE (?1 IS NULL OR kind = ?1)
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map((kind, limit), |row| {
            Ok(IssuedRow {
                id: row.get(0)?,
                identifier: row.get(1)?,
                kind: row.get(2)?,
                format: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
