//! Shared entities, clock and stores for integration tests.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;
use trial_persistence::persistence::{
    adapters::memory::{InMemoryRecordStore, InMemorySession},
    domain::{
        Actor, Auditable, DELETED_COLUMN, Entity, Pk, Query, Record, RecordMappingError,
        SoftDeletable, Timestamps,
    },
    ports::{RecordStore, StoreError, StoreResult, StoreSession, StoredRow},
    unit_of_work::UnitOfWorkFactory,
};

/// Live table of [`Dataset`].
pub const DATASET_TABLE: &str = "dataset";
/// History table of [`Dataset`].
pub const DATASET_AUDIT_TABLE: &str = "dataset_audit";

/// Audited entity describing one clinical dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub pk: Option<Pk>,
    pub name: String,
    pub status: String,
    pub deleted: bool,
    pub timestamps: Timestamps,
}

impl Dataset {
    /// Creates an unsaved draft dataset.
    pub fn new(name: &str) -> Self {
        Self {
            pk: None,
            name: name.to_owned(),
            status: "draft".to_owned(),
            deleted: false,
            timestamps: Timestamps::unset(),
        }
    }
}

impl Entity for Dataset {
    const TABLE: &'static str = DATASET_TABLE;

    fn pk(&self) -> Option<Pk> {
        self.pk
    }

    fn set_pk(&mut self, pk: Pk) {
        self.pk = Some(pk);
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("name", self.name.as_str())
            .with("status", self.status.as_str())
            .with(DELETED_COLUMN, self.deleted)
            .with("creation_time", self.timestamps.creation_time)
            .with("last_update_time", self.timestamps.last_update_time)
    }

    fn from_record(pk: Pk, record: &Record) -> Result<Self, RecordMappingError> {
        Ok(Self {
            pk: Some(pk),
            name: record.text("name")?.to_owned(),
            status: record.text("status")?.to_owned(),
            deleted: record.bool(DELETED_COLUMN)?,
            timestamps: Timestamps {
                creation_time: record.optional_timestamp("creation_time")?,
                last_update_time: record.optional_timestamp("last_update_time")?,
            },
        })
    }

    fn timestamps_mut(&mut self) -> Option<&mut Timestamps> {
        Some(&mut self.timestamps)
    }
}

impl SoftDeletable for Dataset {
    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}

impl Auditable for Dataset {
    const AUDIT_TABLE: &'static str = DATASET_AUDIT_TABLE;
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct SteppingClock {
    now: Mutex<DateTime<Utc>>,
}

impl SteppingClock {
    /// Starts the clock at `now`.
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, step: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += step;
    }
}

impl Clock for SteppingClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Instant on the test day.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, hour, minute, 0)
        .single()
        .expect("valid test instant")
}

/// Interactive user acting in most tests.
pub fn investigator() -> Actor {
    Actor::user(Pk::new(7), "investigator")
}

/// Automated client.
pub fn import_robot() -> Actor {
    Actor::robot(Pk::new(3), "import-robot")
}

/// Record store whose sessions fail every insert into one table.
pub struct FailingInsertStore {
    inner: InMemoryRecordStore,
    table: &'static str,
}

impl FailingInsertStore {
    /// Wraps `inner`, failing inserts into `table`.
    pub fn new(inner: InMemoryRecordStore, table: &'static str) -> Self {
        Self { inner, table }
    }
}

impl RecordStore for FailingInsertStore {
    fn open_session(&self) -> StoreResult<Box<dyn StoreSession>> {
        Ok(Box::new(FailingInsertSession {
            inner: self.inner.session(),
            table: self.table,
        }))
    }
}

struct FailingInsertSession {
    inner: InMemorySession,
    table: &'static str,
}

impl StoreSession for FailingInsertSession {
    fn begin(&mut self) -> StoreResult<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.inner.rollback()
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    fn insert(&mut self, table: &str, record: &Record) -> StoreResult<Pk> {
        if table == self.table {
            return Err(StoreError::backend(std::io::Error::other(format!(
                "insert into {table} refused"
            ))));
        }
        self.inner.insert(table, record)
    }

    fn update(&mut self, table: &str, pk: Pk, record: &Record) -> StoreResult<()> {
        self.inner.update(table, pk, record)
    }

    fn delete(&mut self, table: &str, pk: Pk) -> StoreResult<()> {
        self.inner.delete(table, pk)
    }

    fn select(&mut self, query: &Query) -> StoreResult<Vec<StoredRow>> {
        self.inner.select(query)
    }
}

/// Store, clock and factory wired together.
pub struct Harness {
    pub store: InMemoryRecordStore,
    pub clock: Arc<SteppingClock>,
    pub factory: UnitOfWorkFactory,
}

impl Harness {
    /// Harness over a healthy in-memory store.
    pub fn new() -> Self {
        let store = InMemoryRecordStore::new();
        Self::over(store.clone(), Arc::new(store))
    }

    /// Harness whose sessions refuse inserts into `table`.
    pub fn failing_inserts_into(table: &'static str) -> Self {
        let store = InMemoryRecordStore::new();
        let failing = FailingInsertStore::new(store.clone(), table);
        Self::over(store, Arc::new(failing))
    }

    fn over(store: InMemoryRecordStore, backend: Arc<dyn RecordStore>) -> Self {
        let clock = Arc::new(SteppingClock::starting_at(at(9, 0)));
        let factory = UnitOfWorkFactory::new(backend, clock.clone());
        Self {
            store,
            clock,
            factory,
        }
    }

    /// Committed rows of `table`.
    pub fn rows(&self, table: &str) -> usize {
        self.store.row_count(table).expect("row count")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
