//! SQLite-backed trace cache.

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use proftrace_core::{QueryId, QueryTrace};
use rusqlite::{params, Connection, TransactionBehavior};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::record::{TraceQuery, TraceSummary};

/// File name of the cache inside a log directory.
pub const DEFAULT_STORE_FILE: &str = "proftrace.db";

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from trace store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Lock error")]
    Lock,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One memoized [`QueryTrace`] per query id.
///
/// Several processes may point at the same database; concurrent first builds
/// of a query race to insert and every one of them reads back the winner.
pub struct TraceStore {
    conn: Mutex<Connection>,
}

impl TraceStore {
    /// Opens (or creates) the cache at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::with_connection(conn)
    }

    /// Opens the cache kept alongside the logs in `log_dir`.
    pub fn open_in(log_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::new(log_dir.as_ref().join(DEFAULT_STORE_FILE))
    }

    /// Creates an in-memory trace store (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS query_traces (
                query_id INTEGER PRIMARY KEY,
                build_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                fragment_count INTEGER NOT NULL,
                end_ns INTEGER NOT NULL,
                trace_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_query_traces_created ON query_traces(created_at DESC);
            "#,
        )?;

        Ok(())
    }

    /// Retrieves the cached trace of a query.
    pub fn get_trace(&self, query_id: QueryId) -> Result<Option<QueryTrace>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;

        let result = conn.query_row(
            "SELECT trace_json FROM query_traces WHERE query_id = ?1",
            params![query_id],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Stores `trace` for `query_id` unless a trace is already cached, and
    /// returns whichever trace is stored afterwards. The flag is true when
    /// this call wrote the row.
    pub fn create_or_attach(
        &self,
        query_id: QueryId,
        trace: &QueryTrace,
    ) -> Result<(QueryTrace, bool), StoreError> {
        let build_id = Uuid::new_v4().to_string();
        let json = serde_json::to_string(trace)?;

        let mut conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            r#"INSERT OR IGNORE INTO query_traces
               (query_id, build_id, created_at, fragment_count, end_ns, trace_json)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                query_id,
                build_id,
                now_ms(),
                trace.fragments.len() as u32,
                trace.end,
                json,
            ],
        )?;

        let (stored_id, stored_json) = tx.query_row(
            "SELECT build_id, trace_json FROM query_traces WHERE query_id = ?1",
            params![query_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?;
        tx.commit()?;

        let created = stored_id == build_id;
        debug!(query_id, created, build_id = %stored_id, "Trace cache row resolved");

        let stored = if created {
            trace.clone()
        } else {
            serde_json::from_str(&stored_json)?
        };
        Ok((stored, created))
    }

    /// Lists cached traces, most recent first.
    pub fn list_traces(&self, query: &TraceQuery) -> Result<Vec<TraceSummary>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;

        let mut sql = String::from(
            r#"SELECT query_id, build_id, created_at, fragment_count, end_ns
               FROM query_traces ORDER BY created_at DESC, query_id"#,
        );

        // SQLite only accepts OFFSET after a LIMIT
        match (query.limit, query.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(TraceSummary {
                query_id: row.get(0)?,
                build_id: row.get(1)?,
                created_at: row.get(2)?,
                fragment_count: row.get(3)?,
                end_ns: row.get(4)?,
            })
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }

        Ok(summaries)
    }

    /// Drops the cached trace of a query. Returns whether a row existed.
    pub fn delete_trace(&self, query_id: QueryId) -> Result<bool, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        let removed = conn.execute(
            "DELETE FROM query_traces WHERE query_id = ?1",
            params![query_id],
        )?;
        Ok(removed > 0)
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
