//! Error types for eventledger.
//!
//! Two tiers. `StoreError` is the tagged classification produced at the
//! store-access boundary: every `TableStore` implementation sorts its
//! backend's failures into these variants exactly once, so no other layer
//! inspects error shapes. `Error` is the taxonomy surfaced to callers; the
//! event log and the migrator map `StoreError` into it with
//! [`Error::from_store`], special-casing only the variants they absorb or
//! rename.

use crate::types::TableStatus;

/// Tagged failure classification at the store-access boundary.
///
/// Produced by `TableStore` implementations. The classified variants each
/// stand for a well-known backend error code (see [`StoreError::code`]);
/// `Unexpected` carries anything the implementation could not classify and
/// is propagated to callers unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The named resource does not exist.
    #[error("resource not found")]
    NotFound,

    /// The named resource already exists (store-reported "in use").
    #[error("resource already exists")]
    AlreadyExists,

    /// A single-item conditional write found its condition unmet.
    #[error("conditional check failed")]
    ConditionFailed,

    /// A transactional write was cancelled because at least one item's
    /// condition failed. Nothing in the transaction was written.
    #[error("transaction cancelled by a conflicting condition")]
    TransactionCanceled,

    /// Any other failure the backend reported with an error code.
    #[error("backend error: {code}")]
    Backend {
        /// The backend's error code string.
        code: String,
    },

    /// A failure the store implementation could not classify.
    #[error(transparent)]
    Unexpected(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// The backend error code this classification stands for.
    ///
    /// The classified variants map back to the code strings the original
    /// backend reports, so `Error::Repository` can carry a meaningful code
    /// regardless of which variant it was built from.
    pub fn code(&self) -> &str {
        match self {
            StoreError::NotFound => "ResourceNotFoundException",
            StoreError::AlreadyExists => "ResourceInUseException",
            StoreError::ConditionFailed => "ConditionalCheckFailedException",
            StoreError::TransactionCanceled => "TransactionCanceledException",
            StoreError::Backend { code } => code,
            StoreError::Unexpected(_) => "UnexpectedError",
        }
    }
}

/// Unified error type surfaced to callers of the event log and migrator.
///
/// Callers are expected to branch on the variant:
///
/// - `OptimisticConcurrency` is recoverable -- reload state, recompute the
///   intended append, retry.
/// - `BatchTooLarge` is non-retryable without splitting the batch.
/// - `Timeout` is fatal to the `up()`/`down()` call that raised it.
/// - `Repository` wraps a classified backend failure.
/// - `Store` passes an unclassified failure through unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The lifecycle poll deadline elapsed before the predicate held.
    #[error("timed out waiting for table {table}: last observed status {last_status}")]
    Timeout {
        /// Name of the table being polled.
        table: String,
        /// The status observed on the final poll tick.
        last_status: TableStatus,
    },

    /// The store rejected an append because a `(aggregate_id, version)` key
    /// in the batch was already claimed. No record in the batch was
    /// persisted.
    #[error("optimistic concurrency conflict on aggregate {aggregate_id} at expected version {expected_version}")]
    OptimisticConcurrency {
        /// Aggregate named in the failing append call.
        aggregate_id: String,
        /// The version the caller based its append on.
        expected_version: u64,
    },

    /// The append batch exceeds the transactional write ceiling.
    #[error("event batch of size {size} exceeds the maximum batch size of {max}")]
    BatchTooLarge {
        /// Number of records in the rejected batch.
        size: usize,
        /// The ceiling (`MAX_BATCH_SIZE`).
        max: usize,
    },

    /// A classified backend failure, carrying the backend's error code.
    #[error("backend error: {code}")]
    Repository {
        /// The backend's error code string.
        code: String,
    },

    /// A request argument is invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An unclassified store failure, passed through unchanged.
    #[error(transparent)]
    Store(StoreError),
}

impl Error {
    /// Classify a store failure into the caller-facing taxonomy.
    ///
    /// Unclassified failures pass through unchanged; everything else becomes
    /// `Repository` carrying the backend code. Callers that give a variant
    /// special meaning (absorbed idempotency errors, transaction
    /// cancellation) must match on it before delegating here.
    pub(crate) fn from_store(err: StoreError) -> Error {
        match err {
            StoreError::Unexpected(_) => Error::Store(err),
            classified => Error::Repository {
                code: classified.code().to_string(),
            },
        }
    }
}
