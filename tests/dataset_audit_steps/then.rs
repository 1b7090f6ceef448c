//! Then steps for audited dataset BDD scenarios.

use eyre::WrapErr;
use rstest_bdd_macros::then;
use trial_persistence::persistence::{
    PersistenceError, PersistenceResult,
    domain::{AUDIT_ACTION_TABLE, Condition},
    unit_of_work::UnitOfWorkKind,
};

use super::world::{DATASETS, DatasetAuditWorld};
use crate::test_helpers::DATASET_TABLE;

fn last_save(world: &DatasetAuditWorld) -> Result<&PersistenceResult<bool>, eyre::Report> {
    world
        .last_save
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no save was attempted in this scenario"))
}

#[then(r#"dataset "{name}" has {count:usize} history entries"#)]
fn history_entries(
    world: &DatasetAuditWorld,
    name: String,
    count: usize,
) -> Result<(), eyre::Report> {
    let pk = world.dataset_pk(&name)?;
    let mut uow = world
        .harness
        .factory
        .begin(UnitOfWorkKind::ReadOnly)
        .wrap_err("begin unit of work")?;
    let trails = DATASETS
        .get_audit_trails(&mut uow, pk, None, None)
        .wrap_err("load history")?;
    if trails.len() != count {
        return Err(eyre::eyre!(
            "expected {count} history entries, found {}",
            trails.len()
        ));
    }
    Ok(())
}

#[then(
    r#"the latest history entry of dataset "{name}" was made by "{actor}" because "{rationale}""#
)]
fn latest_history_entry(
    world: &DatasetAuditWorld,
    name: String,
    actor: String,
    rationale: String,
) -> Result<(), eyre::Report> {
    let pk = world.dataset_pk(&name)?;
    let mut uow = world
        .harness
        .factory
        .begin(UnitOfWorkKind::ReadOnly)
        .wrap_err("begin unit of work")?;
    let trails = DATASETS
        .get_audit_trails(&mut uow, pk, None, None)
        .wrap_err("load history")?;
    let latest = trails
        .last()
        .ok_or_else(|| eyre::eyre!("dataset {name} has no history"))?;
    if latest.actor_name() != actor || latest.rationale() != rationale {
        return Err(eyre::eyre!(
            "expected entry by {actor} because {rationale}, found {} because {}",
            latest.actor_name(),
            latest.rationale()
        ));
    }
    Ok(())
}

#[then("the save reports no change")]
fn save_reports_no_change(world: &DatasetAuditWorld) -> Result<(), eyre::Report> {
    match last_save(world)? {
        Ok(false) => Ok(()),
        other => Err(eyre::eyre!("expected an unchanged save, got {other:?}")),
    }
}

#[then(r#"dataset "{name}" is not found by default finders"#)]
fn not_found_by_default_finders(
    world: &DatasetAuditWorld,
    name: String,
) -> Result<(), eyre::Report> {
    let mut uow = world
        .harness
        .factory
        .begin(UnitOfWorkKind::ReadOnly)
        .wrap_err("begin unit of work")?;
    let visible = DATASETS
        .find(
            &mut uow,
            DATASETS.query().filter(Condition::eq("name", name.as_str())),
        )
        .wrap_err("find datasets")?;
    if !visible.is_empty() {
        return Err(eyre::eyre!("dataset {name} is still visible"));
    }
    Ok(())
}

#[then("the unit of work fails with an empty rationale error")]
fn fails_with_empty_rationale(world: &DatasetAuditWorld) -> Result<(), eyre::Report> {
    match last_save(world)? {
        Err(PersistenceError::EmptyRationale) => Ok(()),
        other => Err(eyre::eyre!("expected an empty rationale error, got {other:?}")),
    }
}

#[then("the change is rejected as backdated")]
fn rejected_as_backdated(world: &DatasetAuditWorld) -> Result<(), eyre::Report> {
    match last_save(world)? {
        Err(PersistenceError::BackdatedContext { .. }) => Ok(()),
        other => Err(eyre::eyre!("expected a backdated context error, got {other:?}")),
    }
}

#[then("no dataset rows are stored")]
fn no_dataset_rows(world: &DatasetAuditWorld) -> Result<(), eyre::Report> {
    let rows = world.harness.rows(DATASET_TABLE);
    if rows != 0 {
        return Err(eyre::eyre!("expected no dataset rows, found {rows}"));
    }
    Ok(())
}

#[then("no audit actions are stored")]
fn no_audit_actions(world: &DatasetAuditWorld) -> Result<(), eyre::Report> {
    let rows = world.harness.rows(AUDIT_ACTION_TABLE);
    if rows != 0 {
        return Err(eyre::eyre!("expected no audit actions, found {rows}"));
    }
    Ok(())
}
