//! Append-only event log with optimistic concurrency.
//!
//! `EventLog` stores each aggregate's events under the composite key
//! `(aggregate_id, version)` and enforces at-most-one-writer-wins per key
//! through the store's native conditional transact-write -- no locking,
//! caching, or retrying happens on this side. Concurrency detection is
//! purely key-existence based: writers targeting disjoint versions of the
//! same aggregate can all succeed, while any writer targeting an
//! already-claimed version loses its whole batch.
//!
//! Callers recover from [`Error::OptimisticConcurrency`] by reloading the
//! aggregate's events and recomputing the intended append.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::error::{Error, StoreError};
use crate::store::TableStore;
use crate::types::{EventRecord, ProposedEvent, MAX_BATCH_SIZE};

/// Table name used when the caller does not configure one.
pub const DEFAULT_TABLE_NAME: &str = "eventstore";

/// Injected clock: epoch milliseconds for record timestamps.
pub type ClockFn = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Injected generator for transactional idempotency tokens.
pub type RequestTokenFn = Arc<dyn Fn() -> Uuid + Send + Sync>;

/// Current system time as epoch milliseconds.
fn system_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}

/// Configuration for [`EventLog`].
///
/// The clock stamps `created_at` on appended records; the token generator
/// produces the idempotency token attached to each transactional write.
/// Both are injectable so tests can pin them.
#[derive(Clone)]
pub struct EventLogConfig {
    /// Name of the backing table.
    pub table_name: String,
    clock: ClockFn,
    request_token: RequestTokenFn,
}

impl EventLogConfig {
    /// Configuration for the given table with the default clock and token
    /// generator.
    pub fn new(table_name: impl Into<String>) -> EventLogConfig {
        EventLogConfig {
            table_name: table_name.into(),
            clock: Arc::new(system_clock_ms),
            request_token: Arc::new(Uuid::new_v4),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> EventLogConfig {
        self.clock = Arc::new(clock);
        self
    }

    /// Replace the idempotency-token generator.
    pub fn with_request_token(
        mut self,
        request_token: impl Fn() -> Uuid + Send + Sync + 'static,
    ) -> EventLogConfig {
        self.request_token = Arc::new(request_token);
        self
    }
}

impl Default for EventLogConfig {
    fn default() -> EventLogConfig {
        EventLogConfig::new(DEFAULT_TABLE_NAME)
    }
}

impl std::fmt::Debug for EventLogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogConfig")
            .field("table_name", &self.table_name)
            .finish_non_exhaustive()
    }
}

/// Durable, version-ordered, append-only storage of events per aggregate.
///
/// The table is expected to exist; provision it with
/// [`crate::migrate::Migrator`] before use. The log shares the store client
/// read-only and holds no other state, so one instance serves any number of
/// concurrent tasks.
pub struct EventLog {
    /// Shared store client.
    client: Arc<dyn TableStore>,
    config: EventLogConfig,
}

impl EventLog {
    /// Create an event log over the given store client.
    pub fn new(client: Arc<dyn TableStore>, config: EventLogConfig) -> EventLog {
        EventLog { client, config }
    }

    /// All events of one aggregate, in ascending version order.
    ///
    /// An aggregate with no prior writes yields an empty `Vec` -- that is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty aggregate id,
    /// [`Error::Repository`] for classified backend failures, and passes
    /// unclassified store failures through unchanged.
    pub async fn get_events(&self, aggregate_id: &str) -> Result<Vec<EventRecord>, Error> {
        self.find_from_version(aggregate_id, 0).await
    }

    /// Events of one aggregate with `version >= from_version`, ascending.
    ///
    /// The bound is applied in the store's range query and re-applied
    /// defensively here -- the store's range precision is not assumed.
    ///
    /// # Errors
    ///
    /// Same as [`EventLog::get_events`].
    pub async fn get_events_after_version(
        &self,
        aggregate_id: &str,
        from_version: u64,
    ) -> Result<Vec<EventRecord>, Error> {
        self.find_from_version(aggregate_id, from_version).await
    }

    /// Append a batch of events, all or none.
    ///
    /// Every record is written in one store transaction, each conditioned on
    /// its own `(aggregate_id, version)` key being absent. The batch may
    /// span multiple aggregates; the transaction stays atomic across all of
    /// them, supporting a single causal write touching several aggregates.
    /// All records share one clock reading for `created_at`.
    ///
    /// An empty batch is a no-op success. A batch larger than
    /// [`MAX_BATCH_SIZE`] is rejected before the store is contacted.
    ///
    /// # Errors
    ///
    /// - [`Error::BatchTooLarge`] when the batch exceeds the ceiling.
    /// - [`Error::OptimisticConcurrency`] when the store cancelled the
    ///   transaction over a conflicting condition; nothing was persisted.
    /// - [`Error::Repository`] for other classified backend failures.
    /// - Unclassified store failures pass through unchanged.
    pub async fn append_events(
        &self,
        aggregate_id: &str,
        expected_version: u64,
        batch: Vec<ProposedEvent>,
    ) -> Result<(), Error> {
        if batch.is_empty() {
            return Ok(());
        }
        if batch.len() > MAX_BATCH_SIZE {
            return Err(Error::BatchTooLarge {
                size: batch.len(),
                max: MAX_BATCH_SIZE,
            });
        }

        let created_at = (self.config.clock)();
        let records: Vec<EventRecord> = batch
            .into_iter()
            .map(|event| event.record_at(created_at))
            .collect();
        let token = (self.config.request_token)();

        match self
            .client
            .transact_put(&self.config.table_name, records, token)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::TransactionCanceled) => {
                tracing::warn!(
                    aggregate_id,
                    expected_version,
                    "append cancelled: a version in the batch is already claimed"
                );
                Err(Error::OptimisticConcurrency {
                    aggregate_id: aggregate_id.to_string(),
                    expected_version,
                })
            }
            Err(err) => {
                tracing::error!(
                    aggregate_id,
                    code = err.code(),
                    "transactional append failed"
                );
                Err(Error::from_store(err))
            }
        }
    }

    /// Range-read one aggregate's records from `from_version` upward.
    async fn find_from_version(
        &self,
        aggregate_id: &str,
        from_version: u64,
    ) -> Result<Vec<EventRecord>, Error> {
        if aggregate_id.is_empty() {
            return Err(Error::InvalidArgument(
                "aggregate id must not be empty".to_string(),
            ));
        }

        let mut records = match self
            .client
            .query_range(&self.config.table_name, aggregate_id, from_version)
            .await
        {
            Ok(records) => records,
            Err(err) => {
                tracing::error!(aggregate_id, code = err.code(), "range query failed");
                return Err(Error::from_store(err));
            }
        };

        // Defensive: re-sort and re-apply the bound rather than trusting the
        // store's range-query precision.
        records.sort_by_key(|record| record.version);
        records.retain(|record| record.version >= from_version);
        Ok(records)
    }
}
