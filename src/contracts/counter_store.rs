use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::contracts::error::StorageError;

/// Name of the collection that holds counter records.
pub const COUNTER_COLLECTION: &str = "_Counter";

/// A persisted counter, identified by `(model, field)`.
///
/// `count` is the last value handed out, so the next advance returns
/// `count + increment_by`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub model: String,
    pub count: i64,
    pub field: String,
}

/// Durable storage and atomic mutation of counters.
///
/// # Invariants
/// - At most one counter exists per `(model, field)`
/// - `advance` is linearizable per counter: concurrent callers never observe
///   the same resulting count and no increment is lost
/// - `initialize` is idempotent and never resets existing counters
pub trait CounterStore: Send + Sync + Sized {
    /// Storage driver handle the store is initialized against.
    type Connection;

    /// Ensures the counter collection exists on `connection` and returns a store over it.
    fn initialize(connection: &Self::Connection) -> Result<Self, StorageError>;

    /// Point lookup by identity.
    fn find_counter(
        &self,
        model: &str,
        field: &str,
    ) -> impl Future<Output = Result<Option<Counter>, StorageError>> + Send;

    /// Inserts a new counter.
    ///
    /// Fails with [`StorageError::DuplicateKey`] if the identity already exists,
    /// including when a concurrent creator won the race.
    fn create_counter(
        &self,
        model: &str,
        field: &str,
        initial_count: i64,
    ) -> impl Future<Output = Result<Counter, StorageError>> + Send;

    /// Atomically adds `increment_by` to the stored count and returns the result.
    fn advance(
        &self,
        counter: &Counter,
        increment_by: i64,
    ) -> impl Future<Output = Result<i64, StorageError>> + Send;
}
