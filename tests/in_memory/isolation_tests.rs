//! Concurrent units of work on separate threads and tasks.

use std::thread;

use rstest::rstest;
use trial_persistence::persistence::{
    PersistenceError,
    cache::lock_cache,
    domain::{AUDIT_ACTION_TABLE, Entity},
    unit_of_work::UnitOfWorkKind,
};

use super::helpers::{DATASETS, audited, create_dataset, harness};
use crate::test_helpers::{DATASET_AUDIT_TABLE, DATASET_TABLE, Dataset, Harness};

#[rstest]
fn threads_each_get_their_own_cache_and_action(harness: Harness) {
    let handles: Vec<_> = (0..4)
        .map(|index| {
            let factory = harness.factory.clone();
            thread::spawn(move || {
                factory.run_blocking(audited("Parallel import"), move |uow| {
                    let context = uow.require_context()?;
                    let name = format!("Dataset {index}");
                    DATASETS.create(uow, Dataset::new(&name), &context, "import")?;
                    let cached = lock_cache(&uow.cache()).object_count();
                    Ok((uow.id(), context.audit_action().pk(), cached))
                })
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread").expect("unit of work"))
        .collect();

    let mut units: Vec<_> = results.iter().map(|(unit, _, _)| *unit).collect();
    let mut actions: Vec<_> = results.iter().map(|(_, action, _)| *action).collect();
    units.sort_by_key(ToString::to_string);
    units.dedup();
    actions.sort();
    actions.dedup();
    assert_eq!(units.len(), 4);
    assert_eq!(actions.len(), 4);
    assert!(results.iter().all(|(_, _, cached)| *cached == 1));
    assert_eq!(harness.rows(DATASET_TABLE), 4);
    assert_eq!(harness.rows(DATASET_AUDIT_TABLE), 4);
    assert_eq!(harness.rows(AUDIT_ACTION_TABLE), 4);
    assert!(harness.factory.registry().active_units().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn async_units_run_on_blocking_workers(harness: Harness) {
    let pk = create_dataset(&harness, "Vitals").expect("create");

    let (first, second) = tokio::join!(
        harness.factory.run(UnitOfWorkKind::ReadOnly, move |uow| {
            DATASETS
                .get_by_pk(uow, pk)?
                .map(|d| d.read().name.clone())
                .ok_or(PersistenceError::MissingKey {
                    table: Dataset::TABLE,
                })
        }),
        harness.factory.run(audited("Rename"), move |uow| {
            let context = uow.require_context()?;
            let dataset = DATASETS
                .get_by_pk(uow, pk)?
                .ok_or(PersistenceError::MissingKey {
                    table: Dataset::TABLE,
                })?;
            dataset.write().name = "Vital signs".to_owned();
            DATASETS.save(uow, &dataset, &context, "rename")
        }),
    );

    let seen = first.expect("read");
    assert!(seen == "Vitals" || seen == "Vital signs");
    assert!(second.expect("rename"));
    assert_eq!(harness.rows(DATASET_AUDIT_TABLE), 2);
}
