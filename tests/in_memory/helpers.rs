//! Fixtures for in-memory integration tests.

use rstest::fixture;
use trial_persistence::persistence::{
    PersistenceError, PersistenceResult,
    domain::{Entity, Pk},
    services::AuditableRepository,
    unit_of_work::{UnitOfWork, UnitOfWorkKind},
};

use crate::test_helpers::{Dataset, Harness, investigator};

/// Repository under test.
pub const DATASETS: AuditableRepository<Dataset> = AuditableRepository::new();

/// Provides a fresh harness for each test.
#[fixture]
pub fn harness() -> Harness {
    Harness::new()
}

/// Audited unit of work kind acting as the investigator.
pub fn audited(rationale: &str) -> UnitOfWorkKind {
    UnitOfWorkKind::audited(Some(investigator()), rationale)
}

/// Creates a dataset in its own unit of work and returns its key.
///
/// # Errors
///
/// Returns the persistence error of the unit of work.
pub fn create_dataset(harness: &Harness, name: &str) -> PersistenceResult<Pk> {
    harness.factory.run_blocking(audited("Create dataset"), |uow| {
        let context = uow.require_context()?;
        let created = DATASETS.create(uow, Dataset::new(name), &context, "create")?;
        created.pk().ok_or(PersistenceError::MissingKey {
            table: Dataset::TABLE,
        })
    })
}

/// Applies `change` to a stored dataset and saves it with `rationale`.
///
/// # Errors
///
/// Returns the persistence error of the save.
pub fn edit_dataset(
    uow: &mut UnitOfWork,
    pk: Pk,
    rationale: &str,
    change: impl FnOnce(&mut Dataset),
) -> PersistenceResult<bool> {
    let context = uow.require_context()?;
    let dataset = DATASETS
        .get_by_pk(uow, pk)?
        .ok_or(PersistenceError::MissingKey {
            table: Dataset::TABLE,
        })?;
    change(&mut dataset.write());
    DATASETS.save(uow, &dataset, &context, rationale)
}
