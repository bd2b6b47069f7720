//! Statement classification and execution against a single connection.

use crate::error::DbError;
use crate::value::{value_to_json, Row, RowLayout, SqlParam};
use rusqlite::{Connection, Statement};
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Which driver path a statement takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Result-producing statement; rows are collected.
    Read,
    /// Anything else; the affected row count is reported.
    Write,
}

/// Classifies `sql` by prefix: after trimming and uppercasing, text that
/// starts with `SELECT` is a read.
///
/// Leading comments and `WITH ... SELECT` are classified as writes.
pub fn classify(sql: &str) -> StatementKind {
    if sql.trim().to_uppercase().starts_with("SELECT") {
        StatementKind::Read
    } else {
        StatementKind::Write
    }
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    /// Rows affected by the most recent INSERT, UPDATE or DELETE.
    pub changes: u64,
    /// Row id of the most recent successful insert on this connection.
    pub last_insert_id: i64,
}

impl Serialize for WriteSummary {
    // `lastID` is kept as an alias for clients of the older response shape.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("WriteSummary", 3)?;
        s.serialize_field("changes", &self.changes)?;
        s.serialize_field("lastInsertId", &self.last_insert_id)?;
        s.serialize_field("lastID", &self.last_insert_id)?;
        s.end()
    }
}

/// Result of one executed statement.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    /// Rows in the order SQLite produced them.
    Rows(Vec<Row>),
    Write(WriteSummary),
}

impl QueryResult {
    pub fn kind(&self) -> StatementKind {
        match self {
            QueryResult::Rows(_) => StatementKind::Read,
            QueryResult::Write(_) => StatementKind::Write,
        }
    }
}

/// Runs one statement on `conn` with `params` bound positionally.
pub(crate) fn run(
    conn: &Connection,
    sql: &str,
    params: &[SqlParam],
) -> Result<QueryResult, DbError> {
    let kind = classify(sql);
    tracing::debug!(?kind, params = params.len(), "executing statement");

    let result = match kind {
        StatementKind::Read => QueryResult::Rows(query_rows(conn, sql, params)?),
        StatementKind::Write => QueryResult::Write(execute_write(conn, sql, params)?),
    };
    Ok(result)
}

/// Binds `params` positionally. Placeholders left without a value read as
/// NULL; more values than placeholders is a range error.
fn bind_params(stmt: &mut Statement<'_>, params: &[SqlParam]) -> Result<(), rusqlite::Error> {
    if params.len() > stmt.parameter_count() {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_RANGE),
            Some("column index out of range".to_string()),
        ));
    }
    for (idx, param) in params.iter().enumerate() {
        stmt.raw_bind_parameter(idx + 1, param)?;
    }
    Ok(())
}

fn query_rows(
    conn: &Connection,
    sql: &str,
    params: &[SqlParam],
) -> Result<Vec<Row>, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    let layout = RowLayout::new(stmt.column_names());
    bind_params(&mut stmt, params)?;

    let mut rows = stmt.raw_query();
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..layout.column_count())
            .map(|idx| row.get_ref(idx).map(value_to_json))
            .collect::<Result<Vec<_>, _>>()?;
        out.push(layout.row(values));
    }
    Ok(out)
}

fn execute_write(
    conn: &Connection,
    sql: &str,
    params: &[SqlParam],
) -> Result<WriteSummary, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    bind_params(&mut stmt, params)?;

    // Step to completion; PRAGMA and CTE statements land here and may yield
    // rows, which are discarded.
    let mut rows = stmt.raw_query();
    while rows.next()?.is_some() {}
    drop(rows);

    Ok(WriteSummary {
        changes: conn.changes(),
        last_insert_id: conn.last_insert_rowid(),
    })
}
