//! Reconstruction of entity timelines from history rows.

use crate::persistence::domain::{
    ActorKey, AuditTrail, ColumnValue, Condition, Pk, Query, SortOrder, Timeframe, audit_columns,
};

/// Extracts one tracked property from an entity snapshot.
pub type PropertyExtractor<'a, T> = &'a dyn Fn(&T) -> ColumnValue;

/// Builds the history query of one live row, oldest first.
///
/// Rows are bounded by the half-open `timeframe` on the action date and,
/// when `actor` is set, restricted to that user or robot.
#[must_use]
pub fn audit_trail_query(
    audit_table: &str,
    object_pk: Pk,
    timeframe: Option<&Timeframe>,
    actor: Option<ActorKey>,
) -> Query {
    let mut query = Query::select_from(audit_table)
        .filter(Condition::eq(audit_columns::OBJECT_FK, object_pk));
    if let Some(window) = timeframe {
        for condition in window.conditions(audit_columns::DATETIME) {
            query = query.filter(condition);
        }
    }
    match actor {
        Some(ActorKey::User(pk)) => query = query.filter(Condition::eq(audit_columns::USER_FK, pk)),
        Some(ActorKey::Robot(pk)) => {
            query = query.filter(Condition::eq(audit_columns::ROBOT_FK, pk));
        }
        None => {}
    }
    query.order_by(audit_columns::DATETIME, SortOrder::Asc)
}

/// Keeps the first entry and every entry whose extracted value differs from
/// the previously kept one.
#[must_use]
pub fn collapse_by_property<T, V, E>(trails: Vec<AuditTrail<T>>, extractor: E) -> Vec<AuditTrail<T>>
where
    V: PartialEq,
    E: Fn(&T) -> V,
{
    let mut previous: Option<V> = None;
    trails
        .into_iter()
        .filter(|trail| {
            let value = extractor(trail.snapshot());
            if previous.as_ref() == Some(&value) {
                false
            } else {
                previous = Some(value);
                true
            }
        })
        .collect()
}

/// Keeps the first entry and every entry where at least one tracked
/// property differs from the previously kept entry.
#[must_use]
pub fn collapse_by_properties<T>(
    trails: Vec<AuditTrail<T>>,
    extractors: &[PropertyExtractor<'_, T>],
) -> Vec<AuditTrail<T>> {
    collapse_by_property(trails, |snapshot| {
        extractors
            .iter()
            .map(|extract| extract(snapshot))
            .collect::<Vec<_>>()
    })
}
