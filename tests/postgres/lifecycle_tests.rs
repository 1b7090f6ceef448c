//! Dataset lifecycle against `PostgreSQL`: history mirroring, atomicity,
//! the single audit action of a unit of work and soft delete.

use chrono::Duration;
use rstest::rstest;
use trial_persistence::persistence::{
    PersistenceError,
    domain::{AUDIT_ACTION_TABLE, Entity},
    unit_of_work::UnitOfWorkKind,
};

use super::helpers::{
    DATASETS, PostgresHarness, audited, create_dataset, edit_dataset, postgres_harness,
};
use crate::test_helpers::{DATASET_AUDIT_TABLE, DATASET_TABLE, Dataset, at};

#[rstest]
#[ignore = "starts an embedded PostgreSQL cluster"]
fn history_rows_mirror_every_committed_change(postgres_harness: PostgresHarness) {
    let harness = postgres_harness;
    let pk = create_dataset(&harness, "Vitals").expect("create");
    let edits: [(&str, fn(&mut Dataset)); 2] = [
        ("lock", |d| d.status = "locked".to_owned()),
        ("rename", |d| d.name = "Vital signs".to_owned()),
    ];
    for (rationale, change) in edits {
        harness.clock.advance(Duration::hours(1));
        harness
            .factory
            .run_blocking(audited(rationale), |uow| {
                edit_dataset(uow, pk, rationale, change)
            })
            .expect("edit");
    }

    let mut uow = harness
        .factory
        .begin(UnitOfWorkKind::ReadOnly)
        .expect("begin");
    let current = DATASETS
        .get_by_pk(&mut uow, pk)
        .expect("lookup")
        .expect("exists");
    let trails = DATASETS
        .get_audit_trails(&mut uow, pk, None, None)
        .expect("history");

    let states: Vec<(&str, &str)> = trails
        .iter()
        .map(|t| (t.snapshot().name.as_str(), t.snapshot().status.as_str()))
        .collect();
    assert_eq!(
        states,
        [
            ("Vitals", "draft"),
            ("Vitals", "locked"),
            ("Vital signs", "locked")
        ]
    );
    assert!(trails
        .last()
        .is_some_and(|latest| latest.snapshot() == &*current.read()));
    assert_eq!(current.read().timestamps.creation_time, Some(at(9, 0)));
    assert_eq!(current.read().timestamps.last_update_time, Some(at(11, 0)));
    assert_eq!(harness.rows(AUDIT_ACTION_TABLE), 3);
}

#[rstest]
#[ignore = "starts an embedded PostgreSQL cluster"]
fn failed_units_leave_no_rows(postgres_harness: PostgresHarness) {
    let harness = postgres_harness;

    let result = harness
        .factory
        .run_blocking(audited("Partial import"), |uow| {
            let context = uow.require_context()?;
            DATASETS.create(uow, Dataset::new("A"), &context, "import")?;
            DATASETS.create(uow, Dataset::new("B"), &context, " ")
        });

    assert!(matches!(result, Err(PersistenceError::EmptyRationale)));
    assert_eq!(harness.rows(DATASET_TABLE), 0);
    assert_eq!(harness.rows(DATASET_AUDIT_TABLE), 0);
    assert_eq!(harness.rows(AUDIT_ACTION_TABLE), 0);
}

#[rstest]
#[ignore = "starts an embedded PostgreSQL cluster"]
fn every_change_of_a_unit_references_one_audit_action(postgres_harness: PostgresHarness) {
    let harness = postgres_harness;

    let keys = harness
        .factory
        .run_blocking(audited("Bulk import"), |uow| {
            let context = uow.require_context()?;
            let first = DATASETS.create(uow, Dataset::new("A"), &context, "import")?;
            let second = DATASETS.create(uow, Dataset::new("B"), &context, "import")?;
            first.write().status = "locked".to_owned();
            DATASETS.save(uow, &first, &context, "lock")?;
            Ok([first.pk(), second.pk()])
        })
        .expect("bulk import");

    let mut uow = harness
        .factory
        .begin(UnitOfWorkKind::ReadOnly)
        .expect("begin");
    let mut actions = Vec::new();
    for pk in keys.into_iter().flatten() {
        let trails = DATASETS
            .get_audit_trails(&mut uow, pk, None, None)
            .expect("history");
        actions.extend(trails.iter().map(|trail| trail.action_pk()));
    }

    assert_eq!(actions.len(), 3);
    assert!(actions.windows(2).all(|pair| pair.first() == pair.last()));
    assert_eq!(harness.rows(AUDIT_ACTION_TABLE), 1);
}

#[rstest]
#[ignore = "starts an embedded PostgreSQL cluster"]
fn delete_then_restore_appends_two_rows(postgres_harness: PostgresHarness) {
    let harness = postgres_harness;
    let pk = create_dataset(&harness, "Vitals").expect("create");
    harness.clock.advance(Duration::hours(1));

    let hidden = harness
        .factory
        .run_blocking(audited("Withdraw and reinstate"), |uow| {
            let context = uow.require_context()?;
            let dataset = DATASETS
                .get_by_pk(uow, pk)?
                .ok_or(PersistenceError::MissingKey {
                    table: Dataset::TABLE,
                })?;
            DATASETS.delete(uow, &dataset, &context, "withdrawn")?;
            let visible = DATASETS.find(uow, DATASETS.query())?;
            DATASETS.restore(uow, &dataset, &context, "reinstated")?;
            Ok(visible.is_empty())
        })
        .expect("delete and restore");

    let mut uow = harness
        .factory
        .begin(UnitOfWorkKind::ReadOnly)
        .expect("begin");
    let trails = DATASETS
        .get_audit_trails(&mut uow, pk, None, None)
        .expect("history");
    let flags: Vec<bool> = trails.iter().map(|t| t.snapshot().deleted).collect();
    let restored = DATASETS
        .find_unique(&mut uow, DATASETS.query())
        .expect("find")
        .expect("visible again");

    assert!(hidden);
    assert_eq!(flags, [false, true, false]);
    assert_eq!(restored.read().name, "Vitals");
    assert_eq!(restored.read().status, "draft");
}
