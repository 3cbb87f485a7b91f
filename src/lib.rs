//! Eventledger: an append-only event log and its table lifecycle manager on
//! top of a partitioned, eventually-consistent table store.
//!
//! Two loosely coupled components share one store client:
//!
//! - [`Migrator`] provisions and tears down the backing table, polling the
//!   store's asynchronous control plane until it settles.
//! - [`EventLog`] appends and reads versioned event records per aggregate,
//!   with optimistic concurrency enforced entirely by the store's
//!   conditional transact-write.
//!
//! The store is consumed through the [`TableStore`] trait;
//! [`InMemoryTableStore`] is the bundled process-local implementation.
//! Logging goes through `tracing` -- install a subscriber to receive it;
//! the crate never writes to stdout on its own.

pub mod error;
pub mod eventlog;
pub mod memory;
pub mod migrate;
pub mod store;
pub mod types;

pub use error::{Error, StoreError};
pub use eventlog::{EventLog, EventLogConfig, DEFAULT_TABLE_NAME};
pub use memory::InMemoryTableStore;
pub use migrate::Migrator;
pub use store::{KeyAttribute, KeyKind, TableSpec, TableStore};
pub use types::{EventRecord, ProposedEvent, TableStatus, MAX_BATCH_SIZE};

#[cfg(test)]
mod tests {
    // Verify that the public surface is accessible at the crate root. Tests
    // use fully-qualified `crate::` paths to confirm re-exports resolve.

    #[test]
    fn reexport_proposed_event() {
        let event = crate::ProposedEvent {
            aggregate_id: "agg".to_string(),
            version: 0,
            event_type: "TestEvent".to_string(),
            payload: bytes::Bytes::from_static(b"{}"),
        };
        assert_eq!(event.event_type, "TestEvent");
    }

    #[test]
    fn reexport_event_record() {
        let record = crate::EventRecord {
            aggregate_id: "agg".to_string(),
            version: 0,
            event_type: "TestEvent".to_string(),
            created_at: 0,
            payload: bytes::Bytes::new(),
        };
        assert_eq!(record.version, 0);
    }

    #[test]
    fn reexport_table_status() {
        assert_eq!(crate::TableStatus::from_store_label("ACTIVE").to_string(), "ACTIVE");
    }

    #[test]
    fn reexport_max_batch_size() {
        assert_eq!(crate::MAX_BATCH_SIZE, 25);
    }

    #[test]
    fn reexport_default_table_name() {
        assert_eq!(crate::DEFAULT_TABLE_NAME, "eventstore");
    }

    #[test]
    fn reexport_error() {
        let err = crate::Error::InvalidArgument("test".into());
        assert!(err.to_string().contains("test"));
    }

    #[test]
    fn reexport_table_spec() {
        let spec = crate::TableSpec::event_log("eventstore");
        assert_eq!(spec.partition_key.kind, crate::KeyKind::Text);
        assert_eq!(spec.sort_key.kind, crate::KeyKind::Number);
    }
}
