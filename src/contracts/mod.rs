pub mod counter_store;
pub mod error;
pub mod host;

pub use counter_store::{Counter, CounterStore, COUNTER_COLLECTION};
pub use error::{AffixError, SequenceError, StorageError};
pub use host::{Document, FieldKind, SaveHook, Schema};
