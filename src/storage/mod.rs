mod config;
mod memory;
mod retry;
mod rocksdb;

pub use config::StoreConfig;
pub use memory::{MemoryConnection, MemoryCounterStore};
pub use retry::RetryConfig;
pub use self::rocksdb::{RocksDbConnection, RocksDbCounterStore};
