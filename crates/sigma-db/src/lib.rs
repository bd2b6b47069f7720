//! Query executor for the Sigma SQL gateway.
//!
//! Owns the single SQLite connection used by the process, classifies SQL
//! text as a read or a write, runs it with bound parameters, and normalizes
//! the outcome into a [`QueryResult`].
//!
//! # Design decisions
//!
//! - **One connection, no pool**: every query funnels through the same
//!   [`Database`] handle. SQLite's own locking orders concurrent writers.
//! - **Prefix classification**: a statement is a read when its trimmed,
//!   uppercased text starts with `SELECT`. Everything else (DML, DDL,
//!   `PRAGMA`, `WITH ... SELECT`) takes the write path.
//! - **Blocking driver, async callers**: [`Database::execute_async`] moves
//!   the blocking rusqlite call onto `spawn_blocking` so the request task
//!   suspends exactly once per query.

mod error;
mod executor;
mod handle;
mod value;

pub use error::{DbError, ParamError};
pub use executor::{classify, QueryResult, StatementKind, WriteSummary};
pub use handle::{Database, DbRuntimeSettings};
pub use value::{Row, SqlParam};
