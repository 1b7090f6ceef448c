//! Column-level representation of stored rows.
//!
//! The persistence core never inspects entity fields directly. Every entity
//! maps itself to a [`Record`] (column name to [`ColumnValue`]) and back, so
//! adapters only ever deal with records and the surrogate key stored beside
//! them.

use super::{Pk, RecordMappingError};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Name of the primary key column. It never appears inside a [`Record`].
pub const PK_COLUMN: &str = "pk";

/// Name of the soft-delete flag column written by soft-deletable entities.
pub const DELETED_COLUMN: &str = "deleted";

/// Fractional-second digits kept by timestamp columns, as in Postgres
/// `timestamptz`.
pub const TIMESTAMP_PRECISION: u16 = 6;

/// A single typed column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ColumnValue {
    /// SQL `NULL`.
    Null,
    /// Boolean column.
    Bool(bool),
    /// 64-bit integer column, also used for foreign keys.
    Integer(i64),
    /// Text column.
    Text(String),
    /// UTC timestamp column with microsecond precision.
    ///
    /// Build it with `From<DateTime<Utc>>`, which truncates to
    /// [`TIMESTAMP_PRECISION`] so both stores compare the same instants.
    #[serde(with = "fixed_width_timestamp")]
    Timestamp(DateTime<Utc>),
    /// Free-form JSON column.
    Json(serde_json::Value),
}

impl ColumnValue {
    /// Returns `true` for [`ColumnValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the name of the value type, as used in mapping errors.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
            Self::Json(_) => "json",
        }
    }

    /// Compares two values of the same type.
    ///
    /// Returns `None` when the types differ or the type has no natural
    /// ordering (JSON).
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Bool(left), Self::Bool(right)) => Some(left.cmp(right)),
            (Self::Integer(left), Self::Integer(right)) => Some(left.cmp(right)),
            (Self::Text(left), Self::Text(right)) => Some(left.cmp(right)),
            (Self::Timestamp(left), Self::Timestamp(right)) => Some(left.cmp(right)),
            _ => None,
        }
    }
}

impl From<bool> for ColumnValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Pk> for ColumnValue {
    fn from(value: Pk) -> Self {
        Self::Integer(value.value())
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ColumnValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for ColumnValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value.trunc_subsecs(TIMESTAMP_PRECISION))
    }
}

impl From<serde_json::Value> for ColumnValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl<T> From<Option<T>> for ColumnValue
where
    T: Into<Self>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Column snapshot of one stored row, excluding its primary key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    columns: BTreeMap<String, ColumnValue>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column and returns the record, for builder-style mappers.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Sets a column value, replacing any previous value.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<ColumnValue>) {
        self.columns.insert(column.into(), value.into());
    }

    /// Returns the raw value of a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.columns.get(column)
    }

    /// Removes a column and returns its value.
    pub fn remove(&mut self, column: &str) -> Option<ColumnValue> {
        self.columns.remove(column)
    }

    /// Returns `true` when the column is present.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Iterates over columns in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` when the record has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Copies every column of `other` into this record.
    pub fn extend(&mut self, other: Self) {
        self.columns.extend(other.columns);
    }

    /// Reads a non-null text column.
    ///
    /// # Errors
    ///
    /// Returns [`RecordMappingError`] when the column is missing or not text.
    pub fn text(&self, column: &str) -> Result<&str, RecordMappingError> {
        self.required(column, "text", |value| match value {
            ColumnValue::Text(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// Reads a nullable text column.
    ///
    /// # Errors
    ///
    /// Returns [`RecordMappingError`] when the column is missing or not text.
    pub fn optional_text(&self, column: &str) -> Result<Option<&str>, RecordMappingError> {
        self.optional(column, "text", |value| match value {
            ColumnValue::Text(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// Reads a non-null integer column.
    ///
    /// # Errors
    ///
    /// Returns [`RecordMappingError`] when the column is missing or not an
    /// integer.
    pub fn integer(&self, column: &str) -> Result<i64, RecordMappingError> {
        self.required(column, "integer", |value| match value {
            ColumnValue::Integer(number) => Some(*number),
            _ => None,
        })
    }

    /// Reads a nullable integer column.
    ///
    /// # Errors
    ///
    /// Returns [`RecordMappingError`] when the column is missing or not an
    /// integer.
    pub fn optional_integer(&self, column: &str) -> Result<Option<i64>, RecordMappingError> {
        self.optional(column, "integer", |value| match value {
            ColumnValue::Integer(number) => Some(*number),
            _ => None,
        })
    }

    /// Reads a non-null foreign key column.
    ///
    /// # Errors
    ///
    /// Returns [`RecordMappingError`] when the column is missing or not an
    /// integer.
    pub fn pk(&self, column: &str) -> Result<Pk, RecordMappingError> {
        self.integer(column).map(Pk::new)
    }

    /// Reads a nullable foreign key column.
    ///
    /// # Errors
    ///
    /// Returns [`RecordMappingError`] when the column is missing or not an
    /// integer.
    pub fn optional_pk(&self, column: &str) -> Result<Option<Pk>, RecordMappingError> {
        self.optional_integer(column)
            .map(|value| value.map(Pk::new))
    }

    /// Reads a non-null boolean column.
    ///
    /// # Errors
    ///
    /// Returns [`RecordMappingError`] when the column is missing or not a
    /// boolean.
    pub fn bool(&self, column: &str) -> Result<bool, RecordMappingError> {
        self.required(column, "bool", |value| match value {
            ColumnValue::Bool(flag) => Some(*flag),
            _ => None,
        })
    }

    /// Reads a non-null timestamp column.
    ///
    /// # Errors
    ///
    /// Returns [`RecordMappingError`] when the column is missing or not a
    /// timestamp.
    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>, RecordMappingError> {
        self.required(column, "timestamp", |value| match value {
            ColumnValue::Timestamp(instant) => Some(*instant),
            _ => None,
        })
    }

    /// Reads a nullable timestamp column.
    ///
    /// # Errors
    ///
    /// Returns [`RecordMappingError`] when the column is missing or not a
    /// timestamp.
    pub fn optional_timestamp(
        &self,
        column: &str,
    ) -> Result<Option<DateTime<Utc>>, RecordMappingError> {
        self.optional(column, "timestamp", |value| match value {
            ColumnValue::Timestamp(instant) => Some(*instant),
            _ => None,
        })
    }

    /// Reads a JSON column.
    ///
    /// # Errors
    ///
    /// Returns [`RecordMappingError`] when the column is missing or not JSON.
    pub fn json(&self, column: &str) -> Result<&serde_json::Value, RecordMappingError> {
        self.required(column, "json", |value| match value {
            ColumnValue::Json(json) => Some(json),
            _ => None,
        })
    }

    fn required<'a, T>(
        &'a self,
        column: &str,
        expected: &'static str,
        extract: impl FnOnce(&'a ColumnValue) -> Option<T>,
    ) -> Result<T, RecordMappingError> {
        let value = self
            .columns
            .get(column)
            .ok_or_else(|| RecordMappingError::MissingColumn(column.to_owned()))?;
        extract(value).ok_or_else(|| RecordMappingError::TypeMismatch {
            column: column.to_owned(),
            expected,
        })
    }

    fn optional<'a, T>(
        &'a self,
        column: &str,
        expected: &'static str,
        extract: impl FnOnce(&'a ColumnValue) -> Option<T>,
    ) -> Result<Option<T>, RecordMappingError> {
        match self.columns.get(column) {
            None => Err(RecordMappingError::MissingColumn(column.to_owned())),
            Some(ColumnValue::Null) => Ok(None),
            Some(value) => extract(value)
                .map(Some)
                .ok_or_else(|| RecordMappingError::TypeMismatch {
                    column: column.to_owned(),
                    expected,
                }),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<ColumnValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// Serialises timestamps with a fixed number of fractional digits so that
/// their textual form sorts chronologically. The ordering holds for years
/// 0 to 9999; chrono prefixes a sign to years outside that range.
mod fixed_width_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

    pub(super) fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|instant| instant.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}
