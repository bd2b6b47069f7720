//! Error types for the query executor.

/// Errors that can occur while opening, using, or closing the database.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The SQLite driver reported a failure. The message is passed through
    /// unmodified.
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The directory holding the database file could not be created.
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The handle was closed during shutdown.
    #[error("database is closed")]
    Closed,

    /// The database failed to open at startup; carries the open failure.
    #[error("database is unavailable: {0}")]
    Unavailable(String),

    /// A thread panicked while holding the connection lock.
    #[error("database lock poisoned")]
    LockPoisoned,

    /// The blocking task running the query failed to complete.
    #[error("database task failed: {0}")]
    Task(String),
}

/// Errors raised while converting request parameters into bound values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    /// Arrays and objects cannot be bound to a placeholder.
    #[error("parameter {index} is not a scalar value")]
    NotScalar { index: usize },
}
