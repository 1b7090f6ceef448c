//! Given steps for audited dataset BDD scenarios.

use eyre::WrapErr;
use rstest_bdd_macros::given;
use trial_persistence::persistence::{PersistenceError, domain::Entity};

use super::world::{DATASETS, DatasetAuditWorld, as_investigator};
use crate::test_helpers::{Dataset, Harness};

#[given("an empty clinical data store")]
fn empty_store(world: &mut DatasetAuditWorld) {
    world.harness = Harness::new();
    world.datasets.clear();
}

#[given(r#"the investigator has created dataset "{name}""#)]
fn dataset_created(world: &mut DatasetAuditWorld, name: String) -> Result<(), eyre::Report> {
    let pk = world
        .harness
        .factory
        .run_blocking(as_investigator("Create dataset"), |uow| {
            let context = uow.require_context()?;
            let created = DATASETS.create(uow, Dataset::new(&name), &context, "create")?;
            created.pk().ok_or(PersistenceError::MissingKey {
                table: Dataset::TABLE,
            })
        })
        .wrap_err("create dataset in scenario setup")?;
    world.datasets.insert(name, pk);
    Ok(())
}
