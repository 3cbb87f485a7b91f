//! Backing-store capability boundary.
//!
//! The event log and the migrator consume the partitioned table store
//! exclusively through the [`TableStore`] trait -- one method per required
//! capability, each returning the tagged [`StoreError`] classification.
//! Implementations own all knowledge of the concrete backend (wire client,
//! attribute encoding, error code matching); nothing above this boundary
//! inspects backend error shapes.
//!
//! This crate ships [`crate::memory::InMemoryTableStore`]; network-backed
//! implementations live in their own crates and implement the same trait.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{EventRecord, TableStatus};

/// Key attribute kind in a table's key schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// String-typed key attribute.
    Text,
    /// Number-typed key attribute.
    Number,
}

/// One attribute of a table's composite key schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    /// Attribute name as persisted by the store.
    pub name: String,
    /// Attribute type.
    pub kind: KeyKind,
}

/// Definition handed to the store's create-table call.
///
/// The event log's layout is one table keyed by
/// `(partition key = aggregate id, sort key = version)`: the partition key
/// groups an aggregate's records and the numeric sort key orders them within
/// the group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Name of the table.
    pub table_name: String,
    /// Partition (hash) key attribute.
    pub partition_key: KeyAttribute,
    /// Sort (range) key attribute.
    pub sort_key: KeyAttribute,
    /// Provisioned read capacity units.
    pub read_capacity: u32,
    /// Provisioned write capacity units.
    pub write_capacity: u32,
}

impl TableSpec {
    /// The event-log table definition: string partition key `PK` holding the
    /// aggregate id, numeric sort key `SK` holding the version.
    pub fn event_log(table_name: impl Into<String>) -> TableSpec {
        TableSpec {
            table_name: table_name.into(),
            partition_key: KeyAttribute {
                name: "PK".to_string(),
                kind: KeyKind::Text,
            },
            sort_key: KeyAttribute {
                name: "SK".to_string(),
                kind: KeyKind::Number,
            },
            read_capacity: 1,
            write_capacity: 1,
        }
    }
}

/// Capabilities required from the backing table store.
///
/// Control plane (`describe_status`, `create_table`, `delete_table`,
/// `list_table_names`) is eventually consistent: create/delete requests are
/// accepted asynchronously and the resulting state must be observed by
/// polling `describe_status`. Data plane calls (`get_item`, `query_range`,
/// `put_item`, `transact_put`) are atomic per call; `transact_put` is the
/// store's native all-or-nothing conditional write and the sole source of
/// this crate's concurrency guarantees.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Current lifecycle status of a table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the table does not exist --
    /// callers polling for existence map that to [`TableStatus::Absent`].
    async fn describe_status(&self, table: &str) -> Result<TableStatus, StoreError>;

    /// Request creation of a table.
    ///
    /// Acceptance does not imply the table is usable; poll
    /// [`TableStore::describe_status`] until it reports `Active`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] when a table of that name
    /// already exists (possibly created by a concurrent caller).
    async fn create_table(&self, spec: &TableSpec) -> Result<(), StoreError>;

    /// Request deletion of a table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no table of that name exists.
    async fn delete_table(&self, table: &str) -> Result<(), StoreError>;

    /// Names of all tables the store currently knows about.
    async fn list_table_names(&self) -> Result<Vec<String>, StoreError>;

    /// Fetch a single record by its full `(aggregate_id, version)` key.
    ///
    /// Returns `Ok(None)` when no record has that key.
    async fn get_item(
        &self,
        table: &str,
        aggregate_id: &str,
        version: u64,
    ) -> Result<Option<EventRecord>, StoreError>;

    /// Range query: all records of one aggregate with
    /// `version >= from_version`, ordered by version ascending.
    async fn query_range(
        &self,
        table: &str,
        aggregate_id: &str,
        from_version: u64,
    ) -> Result<Vec<EventRecord>, StoreError>;

    /// Write a single record, conditioned on its key being absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConditionFailed`] when a record with the same
    /// `(aggregate_id, version)` key already exists.
    async fn put_item(&self, table: &str, record: EventRecord) -> Result<(), StoreError>;

    /// Atomically write every record or none, each conditioned on its own
    /// `(aggregate_id, version)` key being absent.
    ///
    /// `request_token` is the caller-supplied idempotency token for the
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TransactionCanceled`] when any record's
    /// condition fails (including a batch that targets the same key twice);
    /// nothing is written in that case.
    async fn transact_put(
        &self,
        table: &str,
        records: Vec<EventRecord>,
        request_token: Uuid,
    ) -> Result<(), StoreError>;
}
