//! Gap-free, optionally formatted sequence values for documents.
//!
//! A [`SequencePlugin`] is initialized once per storage connection and then
//! attaches sequencing rules to schemas. Each rule owns a [`Sequencer`] that
//! runs before a new document is saved: it advances the named counter in the
//! [`CounterStore`](contracts::CounterStore) and writes
//! `prefix + count + suffix` to the configured field.

pub mod contracts;
pub mod metrics;
pub mod plugin;
pub mod sequencer;
pub mod settings;
pub mod storage;

pub use plugin::SequencePlugin;
pub use sequencer::Sequencer;
pub use settings::{Affix, SequenceOptions, Settings};
