//! Entity rows, history rows and audit actions commit together.

use rstest::rstest;
use trial_persistence::persistence::{
    PersistenceError,
    domain::{AUDIT_ACTION_TABLE, Entity},
    ports::StoreError,
    unit_of_work::UnitOfWorkKind,
};

use super::helpers::{DATASETS, audited, create_dataset, edit_dataset, harness};
use crate::test_helpers::{DATASET_AUDIT_TABLE, DATASET_TABLE, Dataset, Harness};

#[rstest]
fn failing_history_insert_rolls_back_the_entity_write() {
    let harness = Harness::failing_inserts_into(DATASET_AUDIT_TABLE);

    let result = create_dataset(&harness, "Vitals");

    assert!(matches!(
        result,
        Err(PersistenceError::Store(StoreError::Backend(_)))
    ));
    assert_eq!(harness.rows(DATASET_TABLE), 0);
    assert_eq!(harness.rows(AUDIT_ACTION_TABLE), 0);
}

#[rstest]
fn failing_audit_action_prevents_any_work() {
    let harness = Harness::failing_inserts_into(AUDIT_ACTION_TABLE);
    let mut ran = false;

    let result = harness.factory.run_blocking(audited("Create"), |_| {
        ran = true;
        Ok(())
    });

    assert!(matches!(
        result,
        Err(PersistenceError::AuditActionUnavailable(_))
    ));
    assert!(!ran);
    assert!(harness.factory.registry().active_units().is_empty());
}

#[rstest]
fn an_error_late_in_the_unit_discards_earlier_writes(harness: Harness) {
    let pk = create_dataset(&harness, "Vitals").expect("create");

    let result = harness
        .factory
        .run_blocking(audited("Lock and rename"), |uow| {
            edit_dataset(uow, pk, "lock", |d| d.status = "locked".to_owned())?;
            edit_dataset(uow, pk, " ", |d| d.name = "Renamed".to_owned())
        });

    assert!(matches!(result, Err(PersistenceError::EmptyRationale)));
    assert_eq!(harness.rows(DATASET_AUDIT_TABLE), 1);
    assert_eq!(harness.rows(AUDIT_ACTION_TABLE), 1);
    let rows = harness.store.committed_rows(Dataset::TABLE).expect("rows");
    assert!(rows
        .first()
        .is_some_and(|row| row.record.text("status") == Ok("draft")));
}

#[rstest]
fn committed_units_persist_every_write(harness: Harness) {
    let pk = create_dataset(&harness, "Vitals").expect("create");

    let changed = harness
        .factory
        .run_blocking(audited("Lock"), |uow| {
            let locked = edit_dataset(uow, pk, "lock", |d| d.status = "locked".to_owned())?;
            let renamed = edit_dataset(uow, pk, "rename", |d| d.name = "Vital signs".to_owned())?;
            Ok(locked && renamed)
        })
        .expect("edit");

    assert!(changed);
    assert_eq!(harness.rows(DATASET_AUDIT_TABLE), 3);
    assert_eq!(harness.rows(AUDIT_ACTION_TABLE), 2);
    let mut uow = harness
        .factory
        .begin(UnitOfWorkKind::ReadOnly)
        .expect("begin");
    let trails = DATASETS
        .get_audit_trails(&mut uow, pk, None, None)
        .expect("history");
    let rationales: Vec<&str> = trails.iter().map(|t| t.rationale()).collect();
    assert_eq!(rationales, ["create", "lock", "rename"]);
}
