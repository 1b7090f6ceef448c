//! SQL rendering for the `PostgreSQL` record store.
//!
//! Tracked tables have the layout `(pk BIGSERIAL PRIMARY KEY, columns JSONB
//! NOT NULL)`. A column value is stored as a tagged JSON object
//! (`{"type": "integer", "value": 42}`), so a condition on column `c`
//! compares `columns->'c'->'value'` against a bound JSONB parameter after
//! checking the tag. Table and column names cannot be bound; they are
//! validated with [`validate_identifier`] before interpolation.

use serde_json::Value;

use crate::persistence::{
    domain::{ColumnValue, Condition, PK_COLUMN, Query, SortOrder},
    ports::{StoreError, StoreResult},
};

const MAX_IDENTIFIER_LEN: usize = 63;

/// Statement text plus its JSONB parameters, bound in order as `$1..$n`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RenderedSql {
    pub text: String,
    pub params: Vec<Value>,
}

/// Accepts lower-case identifiers made of ASCII letters, digits and
/// underscores, not starting with a digit.
pub(crate) fn validate_identifier(name: &str) -> StoreResult<&str> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|first| first.is_ascii_lowercase() || first == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid_start && valid_rest && name.len() <= MAX_IDENTIFIER_LEN {
        Ok(name)
    } else {
        Err(StoreError::InvalidIdentifier(name.to_owned()))
    }
}

pub(crate) fn render_insert(table: &str) -> StoreResult<String> {
    let table_name = validate_identifier(table)?;
    Ok(format!(
        "INSERT INTO {table_name} (columns) VALUES ($1) RETURNING pk"
    ))
}

pub(crate) fn render_update(table: &str) -> StoreResult<String> {
    let table_name = validate_identifier(table)?;
    Ok(format!("UPDATE {table_name} SET columns = $1 WHERE pk = $2"))
}

pub(crate) fn render_delete(table: &str) -> StoreResult<String> {
    let table_name = validate_identifier(table)?;
    Ok(format!("DELETE FROM {table_name} WHERE pk = $1"))
}

pub(crate) fn render_select(query: &Query) -> StoreResult<RenderedSql> {
    let table_name = validate_identifier(query.table())?;
    let mut renderer = Renderer::default();
    let mut text = format!("SELECT pk, columns FROM {table_name}");

    if !query.conditions().is_empty() {
        let clauses = query
            .conditions()
            .iter()
            .map(|condition| renderer.condition(condition))
            .collect::<StoreResult<Vec<_>>>()?;
        text.push_str(" WHERE ");
        text.push_str(&clauses.join(" AND "));
    }

    let mut ordering = query
        .ordering()
        .iter()
        .map(|term| {
            let direction = match term.order {
                SortOrder::Asc => "ASC",
                SortOrder::Desc => "DESC",
            };
            column_expression(&term.column).map(|expr| format!("{expr} {direction}"))
        })
        .collect::<StoreResult<Vec<_>>>()?;
    ordering.push("pk ASC".to_owned());
    text.push_str(" ORDER BY ");
    text.push_str(&ordering.join(", "));

    if let Some(limit) = query.row_limit() {
        text.push_str(&format!(" LIMIT {limit}"));
    }

    Ok(RenderedSql {
        text,
        params: renderer.params,
    })
}

fn column_expression(column: &str) -> StoreResult<String> {
    if column == PK_COLUMN {
        return Ok("to_jsonb(pk)".to_owned());
    }
    let name = validate_identifier(column)?;
    Ok(format!("(columns->'{name}'->'value')"))
}

fn type_guard(column: &str, value: &ColumnValue) -> StoreResult<Option<String>> {
    if column == PK_COLUMN {
        return Ok(None);
    }
    let name = validate_identifier(column)?;
    Ok(Some(format!(
        "columns->'{name}'->>'type' = '{}'",
        value.type_name()
    )))
}

#[derive(Default)]
struct Renderer {
    params: Vec<Value>,
}

impl Renderer {
    fn bind(&mut self, value: &ColumnValue) -> StoreResult<String> {
        let tagged = serde_json::to_value(value).map_err(StoreError::backend)?;
        let inner = tagged.get("value").cloned().unwrap_or(Value::Null);
        self.params.push(inner);
        Ok(format!("${}", self.params.len()))
    }

    fn condition(&mut self, condition: &Condition) -> StoreResult<String> {
        match condition {
            Condition::Eq(column, value) => self.comparison(column, "=", value, true),
            Condition::Gt(column, value) => self.comparison(column, ">", value, false),
            Condition::Ge(column, value) => self.comparison(column, ">=", value, false),
            Condition::Lt(column, value) => self.comparison(column, "<", value, false),
            Condition::Le(column, value) => self.comparison(column, "<=", value, false),
            Condition::In(column, values) => {
                let clauses = values
                    .iter()
                    .map(|value| self.comparison(column, "=", value, true))
                    .collect::<StoreResult<Vec<_>>>()?;
                Ok(disjunction(&clauses))
            }
            Condition::IsNull(column) => {
                if column == PK_COLUMN {
                    return Ok("FALSE".to_owned());
                }
                Ok(format!("{} IS NULL", column_expression(column)?))
            }
            Condition::And(conditions) => {
                if conditions.is_empty() {
                    return Ok("TRUE".to_owned());
                }
                let clauses = conditions
                    .iter()
                    .map(|nested| self.condition(nested))
                    .collect::<StoreResult<Vec<_>>>()?;
                Ok(format!("({})", clauses.join(" AND ")))
            }
            Condition::Or(conditions) => {
                let clauses = conditions
                    .iter()
                    .map(|nested| self.condition(nested))
                    .collect::<StoreResult<Vec<_>>>()?;
                Ok(disjunction(&clauses))
            }
        }
    }

    // Comparisons with NULL, across types, or ordering JSON never hold.
    fn comparison(
        &mut self,
        column: &str,
        operator: &str,
        value: &ColumnValue,
        equality: bool,
    ) -> StoreResult<String> {
        let expression = column_expression(column)?;
        let orderable = equality || !matches!(value, ColumnValue::Json(_));
        let pk_compatible = column != PK_COLUMN || matches!(value, ColumnValue::Integer(_));
        if value.is_null() || !orderable || !pk_compatible {
            return Ok("FALSE".to_owned());
        }
        let placeholder = self.bind(value)?;
        let comparison = format!("{expression} {operator} {placeholder}::jsonb");
        Ok(match type_guard(column, value)? {
            Some(guard) => format!("({guard} AND {comparison})"),
            None => comparison,
        })
    }
}

fn disjunction(clauses: &[String]) -> String {
    if clauses.is_empty() {
        "FALSE".to_owned()
    } else {
        format!("({})", clauses.join(" OR "))
    }
}
