//! Bound parameter values and result rows.

use crate::error::ParamError;
use base64::Engine;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::sync::Arc;

/// A scalar value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlParam {
    /// Converts a single JSON scalar. Booleans bind as `1` / `0`.
    ///
    /// `index` is only used to label the error.
    pub fn from_json(value: &Value, index: usize) -> Result<Self, ParamError> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Integer(i64::from(*b))),
            Value::Number(n) => Ok(match n.as_i64() {
                Some(i) => Self::Integer(i),
                // u64 values above i64::MAX and all fractional numbers
                None => Self::Real(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Value::String(s) => Ok(Self::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Err(ParamError::NotScalar { index }),
        }
    }

    /// Converts an ordered list of JSON scalars, preserving order.
    pub fn from_json_list(values: &[Value]) -> Result<Vec<Self>, ParamError> {
        values
            .iter()
            .enumerate()
            .map(|(index, value)| Self::from_json(value, index))
            .collect()
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlParam::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlParam::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            SqlParam::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// One result row: column names paired with their values, in the order the
/// statement declares them.
///
/// Column names are shared between all rows of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Column names in declaration order, each name appearing once.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the value stored under `column`.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Iterates `(column, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Maps statement columns onto distinct row keys.
///
/// A name repeated in the result set (`SELECT 1 AS a, 2 AS a`, joins with two
/// `id` columns) keeps the position of its first occurrence and takes the
/// value of its last.
#[derive(Debug, Clone)]
pub(crate) struct RowLayout {
    keys: Arc<[String]>,
    /// Key index for each statement column.
    slots: Vec<usize>,
}

impl RowLayout {
    pub(crate) fn new<'a>(columns: impl IntoIterator<Item = &'a str>) -> Self {
        let mut keys: Vec<String> = Vec::new();
        let mut slots = Vec::new();
        for name in columns {
            let slot = match keys.iter().position(|k| k == name) {
                Some(slot) => slot,
                None => {
                    keys.push(name.to_string());
                    keys.len() - 1
                }
            };
            slots.push(slot);
        }
        Self {
            keys: keys.into(),
            slots,
        }
    }

    /// Number of columns the statement produces.
    pub(crate) fn column_count(&self) -> usize {
        self.slots.len()
    }

    /// Builds a row from one value per statement column, in column order.
    pub(crate) fn row(&self, values: impl IntoIterator<Item = Value>) -> Row {
        let mut out = vec![Value::Null; self.keys.len()];
        for (&slot, value) in self.slots.iter().zip(values) {
            out[slot] = value;
        }
        Row {
            columns: Arc::clone(&self.keys),
            values: out,
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Maps a SQLite column value to JSON.
///
/// Non-finite reals become `null`; blobs are base64-encoded.
pub(crate) fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
    }
}
