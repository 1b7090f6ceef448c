//! Dialect-agnostic selection queries over a single table.

use super::{ColumnValue, PK_COLUMN, Pk, Record};
use std::cmp::Ordering;

/// Filter predicate over the columns of one row.
///
/// The pseudo column [`PK_COLUMN`] addresses the primary key.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Column equals value.
    Eq(String, ColumnValue),
    /// Column equals one of the values.
    In(String, Vec<ColumnValue>),
    /// Column is strictly greater than value.
    Gt(String, ColumnValue),
    /// Column is greater than or equal to value.
    Ge(String, ColumnValue),
    /// Column is strictly less than value.
    Lt(String, ColumnValue),
    /// Column is less than or equal to value.
    Le(String, ColumnValue),
    /// Column is null or absent.
    IsNull(String),
    /// Every nested condition holds.
    And(Vec<Condition>),
    /// At least one nested condition holds.
    Or(Vec<Condition>),
}

impl Condition {
    /// Builds an equality condition.
    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        Self::Eq(column.into(), value.into())
    }

    /// Builds a membership condition.
    #[must_use]
    pub fn is_in<V>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<ColumnValue>,
    {
        Self::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    /// Builds a strict lower bound.
    #[must_use]
    pub fn gt(column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        Self::Gt(column.into(), value.into())
    }

    /// Builds an inclusive lower bound.
    #[must_use]
    pub fn ge(column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        Self::Ge(column.into(), value.into())
    }

    /// Builds a strict upper bound.
    #[must_use]
    pub fn lt(column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        Self::Lt(column.into(), value.into())
    }

    /// Builds an inclusive upper bound.
    #[must_use]
    pub fn le(column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        Self::Le(column.into(), value.into())
    }

    /// Builds a null check.
    #[must_use]
    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull(column.into())
    }

    /// Evaluates the condition against a stored row.
    #[must_use]
    pub fn matches(&self, pk: Pk, record: &Record) -> bool {
        match self {
            Self::Eq(column, value) => {
                compare_column(pk, record, column, value) == Some(Ordering::Equal)
                    || json_equal(record, column, value)
            }
            Self::In(column, values) => values.iter().any(|value| {
                compare_column(pk, record, column, value) == Some(Ordering::Equal)
                    || json_equal(record, column, value)
            }),
            Self::Gt(column, value) => {
                compare_column(pk, record, column, value) == Some(Ordering::Greater)
            }
            Self::Ge(column, value) => matches!(
                compare_column(pk, record, column, value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Lt(column, value) => {
                compare_column(pk, record, column, value) == Some(Ordering::Less)
            }
            Self::Le(column, value) => matches!(
                compare_column(pk, record, column, value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::IsNull(column) => column != PK_COLUMN
                && record.get(column).is_none_or(ColumnValue::is_null),
            Self::And(conditions) => conditions.iter().all(|c| c.matches(pk, record)),
            Self::Or(conditions) => conditions.iter().any(|c| c.matches(pk, record)),
        }
    }
}

fn column_value(pk: Pk, record: &Record, column: &str) -> Option<ColumnValue> {
    if column == PK_COLUMN {
        return Some(ColumnValue::Integer(pk.value()));
    }
    record.get(column).cloned()
}

// SQL semantics: comparing against NULL is never true.
fn compare_column(pk: Pk, record: &Record, column: &str, value: &ColumnValue) -> Option<Ordering> {
    let stored = column_value(pk, record, column)?;
    if stored.is_null() || value.is_null() {
        return None;
    }
    stored.compare(value)
}

fn json_equal(record: &Record, column: &str, value: &ColumnValue) -> bool {
    matches!(
        (record.get(column), value),
        (Some(ColumnValue::Json(stored)), ColumnValue::Json(expected)) if stored == expected
    )
}

/// Sort direction of an ordering term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// Ordering term of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column to sort on.
    pub column: String,
    /// Direction.
    pub order: SortOrder,
}

/// Selection over one table: all conditions must hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    conditions: Vec<Condition>,
    ordering: Vec<OrderBy>,
    limit: Option<usize>,
}

impl Query {
    /// Starts a query that selects every row of `table`.
    #[must_use]
    pub fn select_from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
            ordering: Vec::new(),
            limit: None,
        }
    }

    /// Starts a query selecting the row with the given primary key.
    #[must_use]
    pub fn by_pk(table: impl Into<String>, pk: Pk) -> Self {
        Self::select_from(table).filter(Condition::eq(PK_COLUMN, pk))
    }

    /// Adds a condition.
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Appends an ordering term.
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.ordering.push(OrderBy {
            column: column.into(),
            order,
        });
        self
    }

    /// Caps the number of returned rows.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Table the query selects from.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Conditions, combined with AND.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Ordering terms, most significant first.
    #[must_use]
    pub fn ordering(&self) -> &[OrderBy] {
        &self.ordering
    }

    /// Maximum number of rows, if any.
    #[must_use]
    pub const fn row_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns `true` when every condition holds for the row.
    #[must_use]
    pub fn matches(&self, pk: Pk, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(pk, record))
    }

    /// Compares two rows according to the ordering terms, falling back to
    /// primary key order.
    #[must_use]
    pub fn compare_rows(&self, left: (Pk, &Record), right: (Pk, &Record)) -> Ordering {
        for term in &self.ordering {
            let left_value = column_value(left.0, left.1, &term.column);
            let right_value = column_value(right.0, right.1, &term.column);
            let natural = match (left_value, right_value) {
                (Some(l), Some(r)) => l.compare(&r).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ordering = match term.order {
                SortOrder::Asc => natural,
                SortOrder::Desc => natural.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        left.0.cmp(&right.0)
    }
}
