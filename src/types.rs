//! Core domain types for eventledger.
//!
//! This module defines the types every other module depends on: proposed
//! events (caller-submitted, version already assigned), event records (the
//! persisted, timestamped form), the observable table status enumeration,
//! and the batch size ceiling.

use std::fmt;

use bytes::Bytes;

/// Maximum number of records accepted by a single `append_events` call.
///
/// Larger batches are rejected up front with `Error::BatchTooLarge` -- a
/// deliberate "not yet supported" boundary, never a silent truncation. The
/// ceiling matches the backing store's transactional write limit.
pub const MAX_BATCH_SIZE: usize = 25;

/// An event the caller wants to append to an aggregate's log.
///
/// The caller assigns the version before append; the store never invents
/// version numbers. The payload is an opaque serialized byte buffer -- the
/// log does not interpret its contents.
///
/// # Fields
///
/// * `aggregate_id` - Identifier of the aggregate this event belongs to.
/// * `version` - Caller-assigned, zero-based position within the aggregate.
/// * `event_type` - Domain event type tag (e.g., `"DeviceArmed"`).
/// * `payload` - Opaque serialized event body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedEvent {
    /// Identifier of the aggregate this event belongs to.
    pub aggregate_id: String,
    /// Caller-assigned, zero-based position within the aggregate.
    pub version: u64,
    /// Domain event type tag.
    pub event_type: String,
    /// Opaque serialized event body.
    pub payload: Bytes,
}

impl ProposedEvent {
    /// Convert into the persisted form by stamping a creation timestamp.
    ///
    /// The timestamp comes from the log's injected clock and is shared by
    /// every record of one append batch.
    pub fn record_at(self, created_at: u64) -> EventRecord {
        EventRecord {
            aggregate_id: self.aggregate_id,
            version: self.version,
            event_type: self.event_type,
            created_at,
            payload: self.payload,
        }
    }
}

/// A persisted event record.
///
/// Identity key is `(aggregate_id, version)`; a successfully written pair is
/// never overwritten or deleted (deletion only happens at table granularity
/// via the migrator). `created_at` is epoch milliseconds stamped at append
/// time from the injected clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Identifier of the aggregate this event belongs to.
    pub aggregate_id: String,
    /// Zero-based position within the aggregate.
    pub version: u64,
    /// Domain event type tag.
    pub event_type: String,
    /// Epoch milliseconds, stamped once per append batch.
    pub created_at: u64,
    /// Opaque serialized event body.
    pub payload: Bytes,
}

/// Observable lifecycle status of the backing table.
///
/// The store's control plane is eventually consistent: create and delete
/// requests do not take effect synchronously, so the true state must be
/// polled until it stabilizes. `Absent` is inferred from a "not found"
/// response rather than reported by the store, and `Unknown` covers status
/// labels this crate does not track (the store may report transitional
/// states such as backups or schema updates).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    /// The table does not exist (inferred from a "not found" response).
    Absent,
    /// Create accepted; the table is not yet usable.
    Creating,
    /// The table is ready for reads and writes.
    Active,
    /// Delete accepted; the table is on its way out.
    Deleting,
    /// A store-reported status this crate does not track.
    Unknown,
}

impl TableStatus {
    /// Map a store-reported status label onto the tracked enumeration.
    ///
    /// Unrecognized labels map to `Unknown` rather than failing -- the
    /// poller only needs to distinguish the states it acts on.
    pub fn from_store_label(label: &str) -> TableStatus {
        match label {
            "CREATING" => TableStatus::Creating,
            "ACTIVE" => TableStatus::Active,
            "DELETING" => TableStatus::Deleting,
            _ => TableStatus::Unknown,
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TableStatus::Absent => "ABSENT",
            TableStatus::Creating => "CREATING",
            TableStatus::Active => "ACTIVE",
            TableStatus::Deleting => "DELETING",
            TableStatus::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}
