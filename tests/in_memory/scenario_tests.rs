//! End-to-end dataset lifecycle across two units of work.

use rstest::rstest;
use trial_persistence::persistence::{
    PersistenceError,
    cache::{Tracked, lock_cache},
    domain::{Condition, Entity},
    unit_of_work::UnitOfWorkKind,
};

use super::helpers::{DATASETS, audited, create_dataset, edit_dataset, harness};
use crate::test_helpers::{DATASET_AUDIT_TABLE, Dataset, Harness, investigator};

#[rstest]
fn dataset_lifecycle_across_units_of_work(harness: Harness) {
    let mut uow = harness
        .factory
        .begin(UnitOfWorkKind::Manual)
        .expect("begin");
    let context = uow
        .create_context(Some(investigator()), "Create dataset")
        .expect("context");

    let dataset = DATASETS
        .create(&mut uow, Dataset::new("Vitals"), &context, "Create dataset")
        .expect("create");
    let pk = dataset.pk().expect("key assigned");
    let cached = lock_cache(&uow.cache())
        .get_object::<Dataset>(pk)
        .expect("lookup")
        .expect("cached after create");
    assert!(Tracked::ptr_eq(&cached, &dataset));

    dataset.write().status = "5".to_owned();
    assert!(DATASETS
        .save(&mut uow, &dataset, &context, "Set status")
        .expect("save"));
    assert_eq!(harness.rows(DATASET_AUDIT_TABLE), 2);

    let refetched = DATASETS
        .find_unique(
            &mut uow,
            DATASETS.query().filter(Condition::eq("status", "5")),
        )
        .expect("find")
        .expect("exists");
    assert!(Tracked::ptr_eq(&refetched, &dataset));

    let id = uow.id();
    uow.finish().expect("finish");
    assert!(!harness.factory.registry().is_active(id));

    let mut next = harness
        .factory
        .begin(UnitOfWorkKind::ReadOnly)
        .expect("begin");
    let fresh = DATASETS
        .get_by_pk(&mut next, pk)
        .expect("lookup")
        .expect("exists");
    assert!(!Tracked::ptr_eq(&fresh, &dataset));
    assert_eq!(*fresh.read(), *dataset.read());
}

#[rstest]
fn every_committed_mutation_mirrors_the_post_mutation_state(harness: Harness) {
    let pk = create_dataset(&harness, "Vitals").expect("create");
    let mut states = Vec::new();
    for (rationale, status) in [("lock", "locked"), ("review", "reviewed"), ("close", "closed")] {
        let state = harness
            .factory
            .run_blocking(audited(rationale), |uow| {
                edit_dataset(uow, pk, rationale, |d| d.status = status.to_owned())?;
                let current = DATASETS.get_by_pk(uow, pk)?;
                Ok(current.map(|d| d.snapshot()))
            })
            .expect("edit");
        states.extend(state);
    }

    let mut uow = harness
        .factory
        .begin(UnitOfWorkKind::ReadOnly)
        .expect("begin");
    let trails = DATASETS
        .get_audit_trails(&mut uow, pk, None, None)
        .expect("history");
    let snapshots: Vec<Dataset> = trails.into_iter().skip(1).map(|t| t.into_snapshot()).collect();

    assert_eq!(snapshots, states);
}

#[rstest]
fn delete_then_restore_appends_two_rows_and_keeps_other_fields(harness: Harness) {
    let pk = create_dataset(&harness, "Vitals").expect("create");
    let before = harness
        .factory
        .run_blocking(UnitOfWorkKind::ReadOnly, |uow| {
            Ok(DATASETS.get_by_pk(uow, pk)?.map(|d| d.snapshot()))
        })
        .expect("read")
        .expect("exists");

    let after = harness
        .factory
        .run_blocking(audited("Withdraw and reinstate"), |uow| {
            let context = uow.require_context()?;
            let dataset = DATASETS
                .get_by_pk(uow, pk)?
                .ok_or(PersistenceError::MissingKey {
                    table: Dataset::TABLE,
                })?;
            DATASETS.delete(uow, &dataset, &context, "withdrawn")?;
            DATASETS.restore(uow, &dataset, &context, "reinstated")?;
            Ok(dataset.snapshot())
        })
        .expect("round trip");

    assert!(!after.deleted);
    assert_eq!(after.name, before.name);
    assert_eq!(after.status, before.status);
    assert_eq!(after.timestamps.creation_time, before.timestamps.creation_time);
    assert_eq!(harness.rows(DATASET_AUDIT_TABLE), 3);
}

#[rstest]
fn property_history_collapses_repeated_values(harness: Harness) {
    let pk = create_dataset(&harness, "v0").expect("create");
    let steps = [("v1", "draft"), ("v2", "locked"), ("v3", "locked"), ("v4", "draft")];
    for (name, status) in steps {
        harness
            .factory
            .run_blocking(audited("Edit"), |uow| {
                edit_dataset(uow, pk, "edit", |d| {
                    d.name = name.to_owned();
                    d.status = status.to_owned();
                })
            })
            .expect("edit");
    }
    let mut uow = harness
        .factory
        .begin(UnitOfWorkKind::ReadOnly)
        .expect("begin");

    let trails = DATASETS
        .get_audit_trails_for_property(&mut uow, pk, None, |d: &Dataset| d.status.clone())
        .expect("history");

    let collapsed: Vec<(String, String)> = trails
        .iter()
        .map(|t| (t.snapshot().name.clone(), t.snapshot().status.clone()))
        .collect();
    assert_eq!(
        collapsed,
        [
            ("v0".to_owned(), "draft".to_owned()),
            ("v2".to_owned(), "locked".to_owned()),
            ("v4".to_owned(), "draft".to_owned()),
        ]
    );
}
