use std::path::Path;
use std::sync::Arc;

use backon::Retryable;
use rocksdb::{Direction, ErrorKind, IteratorMode, OptimisticTransactionDB, Options};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::contracts::{Counter, CounterStore, StorageError, COUNTER_COLLECTION};
use crate::storage::{RetryConfig, StoreConfig};

/// Key prefix for counter records
const COUNTER_PREFIX: &str = COUNTER_COLLECTION;
/// Key prefix for collection descriptors
const COLLECTION_PREFIX: &str = "meta:collection";
/// Persisted shape of a counter record
const COUNTER_FIELDS: [&str; 3] = ["model", "count", "field"];
const DESCRIPTOR_VERSION: u32 = 1;

/// Describes a collection stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CollectionDescriptor {
    name: String,
    version: u32,
    fields: Vec<String>,
}

impl CollectionDescriptor {
    fn counters() -> Self {
        Self {
            name: COUNTER_COLLECTION.to_string(),
            version: DESCRIPTOR_VERSION,
            fields: COUNTER_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Handle to an open RocksDB database.
///
/// Cheap to clone; every clone shares the same database.
#[derive(Clone)]
pub struct RocksDbConnection {
    db: Arc<OptimisticTransactionDB>,
    retry: RetryConfig,
}

impl RocksDbConnection {
    /// Opens or creates the database described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        // Counter records are tiny
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db: OptimisticTransactionDB =
            OptimisticTransactionDB::open(&opts, &config.data_dir).map_err(rocks_err)?;
        tracing::info!(path = %config.data_dir.display(), "Opened counter database");

        Ok(Self {
            db: Arc::new(db),
            retry: config.retry.clone(),
        })
    }

    /// Opens or creates a database at `path` with default settings.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open(&StoreConfig::with_data_dir(path.as_ref()))
    }
}

/// RocksDB-backed counter store.
///
/// Advances run in optimistic transactions: read the record with conflict
/// tracking, write the incremented value, commit. A commit that loses to a
/// concurrent writer is retried with backoff.
pub struct RocksDbCounterStore {
    db: Arc<OptimisticTransactionDB>,
    retry: RetryConfig,
}

impl RocksDbCounterStore {
    /// Creates a counter key.
    /// Format: _Counter:{model_len}:{model}:{field}
    ///
    /// The length prefix keeps `("a:b", "c")` and `("a", "b:c")` apart.
    fn counter_key(model: &str, field: &str) -> String {
        format!("{}:{}:{}:{}", COUNTER_PREFIX, model.len(), model, field)
    }

    /// Creates a collection descriptor key.
    fn collection_key(name: &str) -> String {
        format!("{}:{}", COLLECTION_PREFIX, name)
    }

    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
        bincode::serialize(value).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
        bincode::deserialize(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Maps a commit failure, classifying optimistic conflicts.
    fn commit_err(err: rocksdb::Error) -> StorageError {
        match err.kind() {
            ErrorKind::Busy | ErrorKind::TryAgain => StorageError::Conflict(err.to_string()),
            _ => rocks_err(err),
        }
    }

    /// Writes the counter collection descriptor unless it already exists.
    fn ensure_collection(db: &OptimisticTransactionDB) -> Result<(), StorageError> {
        let key = Self::collection_key(COUNTER_COLLECTION);
        let expected = CollectionDescriptor::counters();

        let txn = db.transaction();
        if let Some(bytes) = txn.get_for_update(key.as_bytes(), true).map_err(rocks_err)? {
            let existing: CollectionDescriptor = Self::deserialize(&bytes)?;
            if existing != expected {
                return Err(StorageError::IncompatibleCollection(format!(
                    "{} has version {} with fields {:?}, expected version {} with fields {:?}",
                    existing.name,
                    existing.version,
                    existing.fields,
                    expected.version,
                    expected.fields
                )));
            }
            tracing::debug!(collection = COUNTER_COLLECTION, "Counter collection present");
            return Ok(());
        }

        txn.put(key.as_bytes(), Self::serialize(&expected)?)
            .map_err(rocks_err)?;
        match txn.commit().map_err(Self::commit_err) {
            Ok(()) => {
                tracing::info!(collection = COUNTER_COLLECTION, "Created counter collection");
                Ok(())
            }
            // Another initializer wrote the same descriptor first
            Err(StorageError::Conflict(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn read_counter(&self, model: &str, field: &str) -> Result<Option<Counter>, StorageError> {
        let key = Self::counter_key(model, field);
        match self.db.get(key.as_bytes()).map_err(rocks_err)? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn try_insert(&self, counter: &Counter) -> Result<(), StorageError> {
        let key = Self::counter_key(&counter.model, &counter.field);
        let duplicate = || StorageError::DuplicateKey {
            model: counter.model.clone(),
            field: counter.field.clone(),
        };

        let txn = self.db.transaction();
        if txn
            .get_for_update(key.as_bytes(), true)
            .map_err(rocks_err)?
            .is_some()
        {
            return Err(duplicate());
        }
        txn.put(key.as_bytes(), Self::serialize(counter)?)
            .map_err(rocks_err)?;
        // Losing the commit means a concurrent creator inserted the same key
        txn.commit().map_err(|e| match Self::commit_err(e) {
            StorageError::Conflict(_) => duplicate(),
            other => other,
        })
    }

    fn try_advance(&self, counter: &Counter, increment_by: i64) -> Result<i64, StorageError> {
        let key = Self::counter_key(&counter.model, &counter.field);

        let txn = self.db.transaction();
        let bytes = txn
            .get_for_update(key.as_bytes(), true)
            .map_err(rocks_err)?
            .ok_or_else(|| StorageError::CounterNotFound {
                model: counter.model.clone(),
                field: counter.field.clone(),
            })?;
        let mut stored: Counter = Self::deserialize(&bytes)?;
        stored.count =
            stored
                .count
                .checked_add(increment_by)
                .ok_or_else(|| StorageError::CounterOverflow {
                    model: counter.model.clone(),
                    field: counter.field.clone(),
                })?;

        txn.put(key.as_bytes(), Self::serialize(&stored)?)
            .map_err(rocks_err)?;
        txn.commit().map_err(Self::commit_err)?;
        Ok(stored.count)
    }

    /// Lists every counter in the collection, ordered by key.
    pub fn list_counters(&self) -> Result<Vec<Counter>, StorageError> {
        let prefix = format!("{}:", COUNTER_PREFIX);
        let mut counters = Vec::new();
        for item in self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward))
        {
            let (key, value) = item.map_err(rocks_err)?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            counters.push(Self::deserialize(&value)?);
        }
        Ok(counters)
    }
}

impl CounterStore for RocksDbCounterStore {
    type Connection = RocksDbConnection;

    fn initialize(connection: &RocksDbConnection) -> Result<Self, StorageError> {
        Self::ensure_collection(&connection.db)?;
        Ok(Self {
            db: Arc::clone(&connection.db),
            retry: connection.retry.clone(),
        })
    }

    async fn find_counter(&self, model: &str, field: &str) -> Result<Option<Counter>, StorageError> {
        self.read_counter(model, field)
    }

    async fn create_counter(
        &self,
        model: &str,
        field: &str,
        initial_count: i64,
    ) -> Result<Counter, StorageError> {
        let counter = Counter {
            model: model.to_string(),
            count: initial_count,
            field: field.to_string(),
        };
        self.try_insert(&counter)?;
        Ok(counter)
    }

    async fn advance(&self, counter: &Counter, increment_by: i64) -> Result<i64, StorageError> {
        (|| async { self.try_advance(counter, increment_by) })
            .retry(self.retry.backoff())
            .when(StorageError::is_conflict)
            .notify(|err, dur| {
                tracing::debug!(
                    model = %counter.model,
                    field = %counter.field,
                    error = %err,
                    retry_in = ?dur,
                    "Counter advance conflicted, retrying"
                );
            })
            .await
    }
}

fn rocks_err(err: rocksdb::Error) -> StorageError {
    StorageError::RocksDb(err.to_string())
}
