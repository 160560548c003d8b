use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::contracts::{Counter, CounterStore, StorageError, COUNTER_COLLECTION};

type CounterKey = (String, String);
type CounterTable = DashMap<CounterKey, Counter>;

/// In-process stand-in for a storage connection.
///
/// Clones share the same collections, so a store initialized twice against
/// one connection sees the same counters.
#[derive(Clone, Default)]
pub struct MemoryConnection {
    collections: Arc<DashMap<String, Arc<CounterTable>>>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the collections created on this connection.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

/// Counter store held in a concurrent map.
///
/// Each advance mutates the record under its shard's write lock, which makes
/// it linearizable per counter.
pub struct MemoryCounterStore {
    counters: Arc<CounterTable>,
}

impl MemoryCounterStore {
    fn key(model: &str, field: &str) -> CounterKey {
        (model.to_string(), field.to_string())
    }

    /// Snapshot of every stored counter.
    pub fn counters(&self) -> Vec<Counter> {
        self.counters.iter().map(|e| e.value().clone()).collect()
    }
}

impl CounterStore for MemoryCounterStore {
    type Connection = MemoryConnection;

    fn initialize(connection: &MemoryConnection) -> Result<Self, StorageError> {
        let table = connection
            .collections
            .entry(COUNTER_COLLECTION.to_string())
            .or_insert_with(|| Arc::new(DashMap::new()));
        Ok(Self {
            counters: Arc::clone(table.value()),
        })
    }

    async fn find_counter(&self, model: &str, field: &str) -> Result<Option<Counter>, StorageError> {
        Ok(self
            .counters
            .get(&Self::key(model, field))
            .map(|c| c.value().clone()))
    }

    async fn create_counter(
        &self,
        model: &str,
        field: &str,
        initial_count: i64,
    ) -> Result<Counter, StorageError> {
        match self.counters.entry(Self::key(model, field)) {
            Entry::Occupied(_) => Err(StorageError::DuplicateKey {
                model: model.to_string(),
                field: field.to_string(),
            }),
            Entry::Vacant(slot) => {
                let counter = Counter {
                    model: model.to_string(),
                    count: initial_count,
                    field: field.to_string(),
                };
                slot.insert(counter.clone());
                Ok(counter)
            }
        }
    }

    async fn advance(&self, counter: &Counter, increment_by: i64) -> Result<i64, StorageError> {
        let mut stored = self
            .counters
            .get_mut(&Self::key(&counter.model, &counter.field))
            .ok_or_else(|| StorageError::CounterNotFound {
                model: counter.model.clone(),
                field: counter.field.clone(),
            })?;
        stored.count =
            stored
                .count
                .checked_add(increment_by)
                .ok_or_else(|| StorageError::CounterOverflow {
                    model: counter.model.clone(),
                    field: counter.field.clone(),
                })?;
        Ok(stored.count)
    }
}
