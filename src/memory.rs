//! Process-local implementation of the store boundary.
//!
//! `InMemoryTableStore` backs the crate's test suite and local development.
//! It reproduces the two store behaviors the components above it are built
//! to tolerate: an eventually-consistent control plane (tables settle into
//! `Active`/gone only under repeated observation) and an all-or-nothing
//! conditional transact-write on the data plane.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{TableSpec, TableStore};
use crate::types::{EventRecord, TableStatus};

/// Control-plane phase of one in-memory table.
///
/// Transitional phases carry the number of `describe_status` observations
/// left before the table settles. The clock is observation-driven, not
/// wall-time-driven, so tests stay deterministic.
#[derive(Debug)]
enum Phase {
    Creating { remaining: u32 },
    Active,
    Deleting { remaining: u32 },
}

/// One table: its definition, lifecycle phase, and records.
///
/// Records live in a `BTreeMap` keyed by `(aggregate_id, version)` so range
/// scans come back in ascending version order per aggregate.
#[derive(Debug)]
struct TableEntry {
    spec: TableSpec,
    phase: Phase,
    items: BTreeMap<(String, u64), EventRecord>,
}

/// In-memory [`TableStore`] with a scriptable settle delay.
///
/// `settle_observations` is the number of `describe_status` calls a table
/// spends in `Creating` (or `Deleting`) before it becomes `Active` (or
/// gone). The default of zero settles tables on first observation; tests of
/// the lifecycle poller raise it to force the poll loop through transitional
/// states.
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    settle_observations: u32,
    tables: Mutex<HashMap<String, TableEntry>>,
}

impl InMemoryTableStore {
    /// A store whose tables settle on the first status observation.
    pub fn new() -> InMemoryTableStore {
        InMemoryTableStore::default()
    }

    /// A store whose tables spend `settle_observations` status observations
    /// in a transitional phase before settling.
    pub fn with_settle_observations(settle_observations: u32) -> InMemoryTableStore {
        InMemoryTableStore {
            settle_observations,
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// The key schema a table was created with, if it exists.
    ///
    /// Inspection hook for tests; the trait itself only exposes status.
    pub fn table_spec(&self, table: &str) -> Option<TableSpec> {
        let tables = self.tables.lock().expect("table map mutex poisoned");
        tables.get(table).map(|entry| entry.spec.clone())
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn describe_status(&self, table: &str) -> Result<TableStatus, StoreError> {
        let mut tables = self.tables.lock().expect("table map mutex poisoned");
        let Some(entry) = tables.get_mut(table) else {
            return Err(StoreError::NotFound);
        };

        let status = match entry.phase {
            Phase::Creating { remaining: 0 } => {
                entry.phase = Phase::Active;
                TableStatus::Active
            }
            Phase::Creating { remaining } => {
                entry.phase = Phase::Creating {
                    remaining: remaining - 1,
                };
                TableStatus::Creating
            }
            Phase::Active => TableStatus::Active,
            Phase::Deleting { remaining: 0 } => {
                tables.remove(table);
                return Err(StoreError::NotFound);
            }
            Phase::Deleting { remaining } => {
                entry.phase = Phase::Deleting {
                    remaining: remaining - 1,
                };
                TableStatus::Deleting
            }
        };
        Ok(status)
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("table map mutex poisoned");
        if tables.contains_key(&spec.table_name) {
            return Err(StoreError::AlreadyExists);
        }
        tables.insert(
            spec.table_name.clone(),
            TableEntry {
                spec: spec.clone(),
                phase: Phase::Creating {
                    remaining: self.settle_observations,
                },
                items: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("table map mutex poisoned");
        let entry = tables.get_mut(table).ok_or(StoreError::NotFound)?;
        entry.phase = Phase::Deleting {
            remaining: self.settle_observations,
        };
        Ok(())
    }

    async fn list_table_names(&self) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.lock().expect("table map mutex poisoned");
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn get_item(
        &self,
        table: &str,
        aggregate_id: &str,
        version: u64,
    ) -> Result<Option<EventRecord>, StoreError> {
        let tables = self.tables.lock().expect("table map mutex poisoned");
        let entry = tables.get(table).ok_or(StoreError::NotFound)?;
        Ok(entry
            .items
            .get(&(aggregate_id.to_string(), version))
            .cloned())
    }

    async fn query_range(
        &self,
        table: &str,
        aggregate_id: &str,
        from_version: u64,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let tables = self.tables.lock().expect("table map mutex poisoned");
        let entry = tables.get(table).ok_or(StoreError::NotFound)?;

        let lower = (aggregate_id.to_string(), from_version);
        let upper = (aggregate_id.to_string(), u64::MAX);
        Ok(entry
            .items
            .range(lower..=upper)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn put_item(&self, table: &str, record: EventRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("table map mutex poisoned");
        let entry = tables.get_mut(table).ok_or(StoreError::NotFound)?;

        let key = (record.aggregate_id.clone(), record.version);
        if entry.items.contains_key(&key) {
            return Err(StoreError::ConditionFailed);
        }
        entry.items.insert(key, record);
        Ok(())
    }

    async fn transact_put(
        &self,
        table: &str,
        records: Vec<EventRecord>,
        _request_token: Uuid,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("table map mutex poisoned");
        let entry = tables.get_mut(table).ok_or(StoreError::NotFound)?;

        // Check every condition before writing anything. A batch that
        // targets the same key twice cancels like any other conflict.
        let mut claimed: HashSet<(String, u64)> = HashSet::new();
        for record in &records {
            let key = (record.aggregate_id.clone(), record.version);
            if entry.items.contains_key(&key) || !claimed.insert(key) {
                return Err(StoreError::TransactionCanceled);
            }
        }

        for record in records {
            let key = (record.aggregate_id.clone(), record.version);
            entry.items.insert(key, record);
        }
        Ok(())
    }
}
