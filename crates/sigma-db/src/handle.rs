//! The process-wide database handle: opening, sharing, and shutdown.

use crate::error::DbError;
use crate::executor::{self, QueryResult};
use crate::value::SqlParam;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Runtime tunables for the SQLite connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// Busy timeout for the connection, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug)]
enum HandleState {
    Open(Connection),
    Closed,
    /// Opening failed at startup; holds the failure message.
    Unavailable(String),
}

#[derive(Debug)]
struct Inner {
    path: String,
    state: Mutex<HandleState>,
}

/// Shared handle to the single SQLite connection.
///
/// Cloning is cheap and every clone refers to the same connection. Queries
/// hold the connection lock for their whole duration, so statements run one
/// at a time and [`Database::close`] waits for an in-flight query to finish.
#[derive(Debug, Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl Database {
    /// Opens (creating if needed) the database file at `db_path`.
    ///
    /// Missing parent directories are created. Use `:memory:` for an
    /// in-memory database.
    ///
    /// # Errors
    ///
    /// Returns `DbError::CreateDir` if the parent directory cannot be created
    /// and `DbError::Sqlite` if SQLite refuses to open the file.
    pub fn open(db_path: &str, settings: DbRuntimeSettings) -> Result<Self, DbError> {
        if db_path != ":memory:" {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|source| DbError::CreateDir {
                        path: parent.display().to_string(),
                        source,
                    })?;
                }
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let conn = Connection::open_with_flags(db_path, flags)?;
        conn.execute_batch(&format!(
            "PRAGMA busy_timeout = {};",
            settings.busy_timeout_ms
        ))?;

        tracing::debug!(path = db_path, "opened sqlite connection");
        Ok(Self::with_state(db_path, HandleState::Open(conn)))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::open(":memory:", DbRuntimeSettings::default())
    }

    /// Builds a handle for a database that failed to open.
    ///
    /// The server keeps running with this handle; every query fails with
    /// `DbError::Unavailable` carrying `reason`.
    pub fn unavailable(db_path: &str, reason: impl Into<String>) -> Self {
        Self::with_state(db_path, HandleState::Unavailable(reason.into()))
    }

    fn with_state(db_path: &str, state: HandleState) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: db_path.to_string(),
                state: Mutex::new(state),
            }),
        }
    }

    /// The path this handle was opened with.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Whether [`Database::close`] has run on this handle.
    pub fn is_closed(&self) -> bool {
        let state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        matches!(*state, HandleState::Closed)
    }

    /// Classifies and runs `sql`, blocking the calling thread.
    ///
    /// # Errors
    ///
    /// Driver failures surface as `DbError::Sqlite` with SQLite's message.
    /// A closed or never-opened handle fails with `DbError::Closed` or
    /// `DbError::Unavailable`.
    pub fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<QueryResult, DbError> {
        let state = self
            .inner
            .state
            .lock()
            .map_err(|_| DbError::LockPoisoned)?;

        match &*state {
            HandleState::Open(conn) => executor::run(conn, sql, params),
            HandleState::Closed => Err(DbError::Closed),
            HandleState::Unavailable(reason) => Err(DbError::Unavailable(reason.clone())),
        }
    }

    /// Runs [`Database::execute`] on the blocking thread pool and awaits it.
    pub async fn execute_async(
        &self,
        sql: String,
        params: Vec<SqlParam>,
    ) -> Result<QueryResult, DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.execute(&sql, &params))
            .await
            .map_err(|e| DbError::Task(e.to_string()))?
    }

    /// Closes the connection.
    ///
    /// The handle is marked closed even when SQLite reports a failure, so no
    /// query can run afterwards. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Sqlite` if SQLite fails to close the connection.
    pub fn close(&self) -> Result<(), DbError> {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match std::mem::replace(&mut *state, HandleState::Closed) {
            HandleState::Open(conn) => conn.close().map_err(|(_conn, e)| DbError::Sqlite(e)),
            HandleState::Closed | HandleState::Unavailable(_) => Ok(()),
        }
    }

    /// Runs [`Database::close`] on the blocking thread pool and awaits it.
    pub async fn close_async(&self) -> Result<(), DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.close())
            .await
            .map_err(|e| DbError::Task(e.to_string()))?
    }
}
