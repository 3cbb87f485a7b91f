//! Table lifecycle management for the event log.
//!
//! The backing store's control plane is eventually consistent: create and
//! delete are accepted asynchronously and the real state is only observable
//! by polling. `Migrator` owns that tolerance so the event log never has to:
//! `up()` and `down()` are idempotent, absorb the races a concurrent caller
//! can produce, and drive everything through one generic status-polling
//! primitive, `wait_for_status`.
//!
//! The poller is a single bounded loop: query status, test the predicate,
//! sleep one interval, decrement the remaining budget by that interval,
//! repeat. It resolves or fails exactly once and leaves no timer behind on
//! any return path.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, StoreError};
use crate::store::{TableSpec, TableStore};
use crate::types::TableStatus;

/// Poll window for `up()`/`down()` to find a workable starting status.
const SETTLE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Poll interval while `up()` looks for a workable starting status.
const UP_SETTLE_INTERVAL: Duration = Duration::from_millis(500);

/// Poll window for a freshly created table to report `Active`.
const CREATE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Poll interval while waiting on a freshly created table.
const CREATE_INTERVAL: Duration = Duration::from_millis(300);

/// Poll interval for both `down()` waits.
const DOWN_INTERVAL: Duration = Duration::from_millis(200);

/// Idempotent provisioning and teardown of the event log's backing table.
///
/// `up()` and `down()` may be invoked any number of times, from any number
/// of concurrent processes, with the same net effect as invoking each once.
/// The migrator is a setup/teardown dependency only -- the event log never
/// calls it at runtime; the two share nothing but the store client and the
/// error classification.
pub struct Migrator {
    /// Shared store client. Read-only; the migrator holds no other state.
    client: Arc<dyn TableStore>,
    /// Definition of the table this migrator owns.
    spec: TableSpec,
}

impl Migrator {
    /// Create a migrator for the given table definition.
    pub fn new(client: Arc<dyn TableStore>, spec: TableSpec) -> Migrator {
        Migrator { client, spec }
    }

    /// Name of the table this migrator owns.
    pub fn table_name(&self) -> &str {
        &self.spec.table_name
    }

    /// Bring the table up, creating it if it does not exist.
    ///
    /// Polls until the table reports either `Absent` or `Active` (both are
    /// workable starting points -- anything else is a transition that must
    /// settle first). If `Absent`, issues the create request and polls again
    /// until `Active`. A store-reported "already exists" on create means a
    /// concurrent caller won the race; that is absorbed as success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if either poll window closes before the
    /// table settles, [`Error::Repository`] for any other classified create
    /// failure, and passes unclassified store failures through unchanged.
    pub async fn up(&self) -> Result<(), Error> {
        let status = self
            .wait_for_status(SETTLE_TIMEOUT, UP_SETTLE_INTERVAL, |status| {
                matches!(status, TableStatus::Absent | TableStatus::Active)
            })
            .await?;

        if status != TableStatus::Absent {
            // Already active; nothing to do.
            return Ok(());
        }

        match self.client.create_table(&self.spec).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists) => {
                tracing::debug!(
                    table = %self.spec.table_name,
                    "create raced a concurrent caller; table presumed created"
                );
            }
            Err(err) => {
                tracing::error!(
                    table = %self.spec.table_name,
                    code = err.code(),
                    "failed to create table"
                );
                return Err(Error::from_store(err));
            }
        }

        self.wait_for_status(CREATE_TIMEOUT, CREATE_INTERVAL, |status| {
            status == TableStatus::Active
        })
        .await?;
        Ok(())
    }

    /// Tear the table down, deleting it if it exists.
    ///
    /// Polls until the table reports `Absent` or `Active`; if `Active`,
    /// issues the delete request and polls until the table is gone. A
    /// store-reported "not found" on delete means the table is already gone;
    /// that is absorbed as success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if either poll window closes first,
    /// [`Error::Repository`] for any other classified delete failure, and
    /// passes unclassified store failures through unchanged.
    pub async fn down(&self) -> Result<(), Error> {
        let status = self
            .wait_for_status(SETTLE_TIMEOUT, DOWN_INTERVAL, |status| {
                matches!(status, TableStatus::Absent | TableStatus::Active)
            })
            .await?;

        if status != TableStatus::Active {
            // Nothing to delete.
            return Ok(());
        }

        match self.client.delete_table(&self.spec.table_name).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => {
                tracing::debug!(
                    table = %self.spec.table_name,
                    "delete found the table already gone"
                );
            }
            Err(err) => {
                tracing::error!(
                    table = %self.spec.table_name,
                    code = err.code(),
                    "failed to delete table"
                );
                return Err(Error::from_store(err));
            }
        }

        self.wait_for_status(SETTLE_TIMEOUT, DOWN_INTERVAL, |status| {
            status == TableStatus::Absent
        })
        .await?;
        Ok(())
    }

    /// Poll the table's status until `predicate` holds or the budget runs
    /// out.
    ///
    /// One polling session: query the status (a "not found" response maps to
    /// [`TableStatus::Absent`] rather than failing), test the predicate,
    /// and if the remaining budget cannot cover another interval fail with
    /// [`Error::Timeout`] naming the table and the last-observed status.
    /// Otherwise sleep one interval, charge it against the budget, and poll
    /// again. The budget is decremented by `interval` per tick, not by
    /// measured elapsed time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] when the budget is exhausted,
    /// [`Error::Repository`] for classified status-query failures, and
    /// passes unclassified store failures through unchanged.
    pub async fn wait_for_status<P>(
        &self,
        timeout: Duration,
        interval: Duration,
        predicate: P,
    ) -> Result<TableStatus, Error>
    where
        P: Fn(TableStatus) -> bool,
    {
        let mut remaining = timeout;
        loop {
            let status = match self.client.describe_status(&self.spec.table_name).await {
                Ok(status) => status,
                Err(StoreError::NotFound) => TableStatus::Absent,
                Err(err) => {
                    tracing::error!(
                        table = %self.spec.table_name,
                        code = err.code(),
                        "status query failed while polling"
                    );
                    return Err(Error::from_store(err));
                }
            };

            if predicate(status) {
                return Ok(status);
            }
            if remaining < interval {
                return Err(Error::Timeout {
                    table: self.spec.table_name.clone(),
                    last_status: status,
                });
            }

            tokio::time::sleep(interval).await;
            remaining -= interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTableStore;

    use async_trait::async_trait;
    use uuid::Uuid;

    use crate::types::EventRecord;

    fn migrator(client: Arc<dyn TableStore>, table: &str) -> Migrator {
        Migrator::new(client, TableSpec::event_log(table))
    }

    #[tokio::test(start_paused = true)]
    async fn up_creates_an_absent_table() {
        let store = Arc::new(InMemoryTableStore::new());
        let migrator = migrator(store.clone(), "eventstore");

        migrator.up().await.expect("up should succeed");

        let names = store.list_table_names().await.expect("list");
        assert_eq!(names, vec!["eventstore".to_string()]);
        assert_eq!(
            store.describe_status("eventstore").await.expect("describe"),
            TableStatus::Active
        );
    }

    #[tokio::test(start_paused = true)]
    async fn up_waits_out_a_slow_control_plane() {
        let store = Arc::new(InMemoryTableStore::with_settle_observations(2));
        let migrator = migrator(store.clone(), "eventstore");

        migrator.up().await.expect("up should succeed");

        assert_eq!(
            store.describe_status("eventstore").await.expect("describe"),
            TableStatus::Active
        );
    }

    #[tokio::test(start_paused = true)]
    async fn up_twice_is_idempotent() {
        let store = Arc::new(InMemoryTableStore::new());
        let migrator = migrator(store.clone(), "eventstore");

        migrator.up().await.expect("first up should succeed");
        migrator.up().await.expect("second up should succeed");

        let names = store.list_table_names().await.expect("list");
        assert_eq!(names.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn down_removes_an_active_table() {
        let store = Arc::new(InMemoryTableStore::new());
        let migrator = migrator(store.clone(), "eventstore");

        migrator.up().await.expect("up should succeed");
        migrator.down().await.expect("down should succeed");

        let names = store.list_table_names().await.expect("list");
        assert!(names.is_empty(), "expected no tables, got: {names:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn down_on_absent_table_succeeds_silently() {
        let store = Arc::new(InMemoryTableStore::new());
        let migrator = migrator(store, "never-created");

        migrator.down().await.expect("down should succeed");
    }

    #[tokio::test(start_paused = true)]
    async fn down_waits_out_a_slow_delete() {
        let store = Arc::new(InMemoryTableStore::with_settle_observations(2));
        let migrator = migrator(store.clone(), "eventstore");

        migrator.up().await.expect("up should succeed");
        migrator.down().await.expect("down should succeed");

        let result = store.describe_status("eventstore").await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_status_maps_not_found_to_absent() {
        let store = Arc::new(InMemoryTableStore::new());
        let migrator = migrator(store, "missing");

        let status = migrator
            .wait_for_status(
                Duration::from_millis(2000),
                Duration::from_millis(500),
                |status| status == TableStatus::Absent,
            )
            .await
            .expect("wait should resolve");
        assert_eq!(status, TableStatus::Absent);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_status_times_out_with_last_observed_status() {
        // A settle delay far beyond the poll budget keeps the table in
        // Creating for the whole window.
        let store = Arc::new(InMemoryTableStore::with_settle_observations(100));
        store
            .create_table(&TableSpec::event_log("some-table"))
            .await
            .expect("create");
        let migrator = migrator(store, "some-table");

        let err = migrator
            .wait_for_status(
                Duration::from_millis(2000),
                Duration::from_millis(500),
                |status| status == TableStatus::Active,
            )
            .await
            .expect_err("wait should time out");

        assert!(
            matches!(
                err,
                Error::Timeout {
                    ref table,
                    last_status: TableStatus::Creating,
                } if table == "some-table"
            ),
            "expected Timeout(some-table, CREATING), got: {err:?}"
        );
        let msg = err.to_string();
        assert!(msg.contains("some-table"), "expected table name in: {msg}");
        assert!(msg.contains("CREATING"), "expected last status in: {msg}");
    }

    /// Store wrapper that fails every `create_table` with "already exists"
    /// after letting the create through, mimicking a concurrent caller
    /// winning the race between our existence poll and our create request.
    struct ContendedStore {
        inner: InMemoryTableStore,
    }

    #[async_trait]
    impl TableStore for ContendedStore {
        async fn describe_status(&self, table: &str) -> Result<TableStatus, StoreError> {
            self.inner.describe_status(table).await
        }

        async fn create_table(&self, spec: &TableSpec) -> Result<(), StoreError> {
            // The concurrent caller's create lands first; ours is rejected.
            self.inner.create_table(spec).await?;
            Err(StoreError::AlreadyExists)
        }

        async fn delete_table(&self, table: &str) -> Result<(), StoreError> {
            self.inner.delete_table(table).await
        }

        async fn list_table_names(&self) -> Result<Vec<String>, StoreError> {
            self.inner.list_table_names().await
        }

        async fn get_item(
            &self,
            table: &str,
            aggregate_id: &str,
            version: u64,
        ) -> Result<Option<EventRecord>, StoreError> {
            self.inner.get_item(table, aggregate_id, version).await
        }

        async fn query_range(
            &self,
            table: &str,
            aggregate_id: &str,
            from_version: u64,
        ) -> Result<Vec<EventRecord>, StoreError> {
            self.inner
                .query_range(table, aggregate_id, from_version)
                .await
        }

        async fn put_item(&self, table: &str, record: EventRecord) -> Result<(), StoreError> {
            self.inner.put_item(table, record).await
        }

        async fn transact_put(
            &self,
            table: &str,
            records: Vec<EventRecord>,
            request_token: Uuid,
        ) -> Result<(), StoreError> {
            self.inner.transact_put(table, records, request_token).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn up_absorbs_a_lost_create_race() {
        let store = Arc::new(ContendedStore {
            inner: InMemoryTableStore::new(),
        });
        let migrator = migrator(store.clone(), "eventstore");

        migrator.up().await.expect("up should absorb the race");

        assert_eq!(
            store.describe_status("eventstore").await.expect("describe"),
            TableStatus::Active
        );
    }

    /// Store whose status queries fail with an unclassified error.
    struct BrokenStore;

    #[async_trait]
    impl TableStore for BrokenStore {
        async fn describe_status(&self, _table: &str) -> Result<TableStatus, StoreError> {
            Err(StoreError::Unexpected(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))))
        }

        async fn create_table(&self, _spec: &TableSpec) -> Result<(), StoreError> {
            Err(StoreError::Backend {
                code: "InternalServerError".to_string(),
            })
        }

        async fn delete_table(&self, _table: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend {
                code: "InternalServerError".to_string(),
            })
        }

        async fn list_table_names(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }

        async fn get_item(
            &self,
            _table: &str,
            _aggregate_id: &str,
            _version: u64,
        ) -> Result<Option<EventRecord>, StoreError> {
            Ok(None)
        }

        async fn query_range(
            &self,
            _table: &str,
            _aggregate_id: &str,
            _from_version: u64,
        ) -> Result<Vec<EventRecord>, StoreError> {
            Ok(Vec::new())
        }

        async fn put_item(&self, _table: &str, _record: EventRecord) -> Result<(), StoreError> {
            Err(StoreError::Backend {
                code: "InternalServerError".to_string(),
            })
        }

        async fn transact_put(
            &self,
            _table: &str,
            _records: Vec<EventRecord>,
            _request_token: Uuid,
        ) -> Result<(), StoreError> {
            Err(StoreError::Backend {
                code: "InternalServerError".to_string(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unclassified_poll_failure_aborts_and_passes_through() {
        let store = Arc::new(BrokenStore);
        let migrator = migrator(store, "eventstore");

        let err = migrator.up().await.expect_err("up should fail");
        assert!(
            matches!(err, Error::Store(StoreError::Unexpected(_))),
            "expected Store(Unexpected), got: {err:?}"
        );
    }
}
