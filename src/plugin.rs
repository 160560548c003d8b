use std::sync::{Arc, OnceLock};

use crate::contracts::{CounterStore, FieldKind, Schema, SequenceError};
use crate::metrics::SequenceMetrics;
use crate::sequencer::Sequencer;
use crate::settings::{SequenceOptions, Settings};

/// Entry point for attaching sequencing rules to schemas.
///
/// Owns the counter store established by [`initialize`](Self::initialize).
/// Each storage connection gets its own plugin, so independent connections
/// never share counters.
pub struct SequencePlugin<S: CounterStore> {
    store: OnceLock<Arc<S>>,
    metrics: Arc<SequenceMetrics>,
}

impl<S: CounterStore + 'static> SequencePlugin<S> {
    pub fn new() -> Self {
        Self {
            store: OnceLock::new(),
            metrics: Arc::new(SequenceMetrics::new()),
        }
    }

    /// Prepares the counter collection on `connection`.
    ///
    /// Safe to call repeatedly: the collection is created once and existing
    /// counters are kept. The first successfully initialized store is the one
    /// every later `attach` uses.
    pub fn initialize(&self, connection: &S::Connection) -> Result<(), SequenceError> {
        let store = S::initialize(connection).map_err(|source| {
            tracing::error!(error = %source, "Failed to initialize counter store");
            SequenceError::Initialize(source)
        })?;

        if self.store.set(Arc::new(store)).is_err() {
            tracing::debug!("Counter store already initialized");
        } else {
            tracing::info!("Counter store initialized");
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.store.get().is_some()
    }

    /// Attaches a sequencing rule to `schema`.
    ///
    /// Declares the sequence field and registers the sequencer as a pre-save
    /// hook. Fails with `NotInitialized` before [`initialize`](Self::initialize),
    /// and with `Configuration` for invalid options.
    pub fn attach(
        &self,
        schema: &mut dyn Schema,
        options: SequenceOptions,
    ) -> Result<Arc<Sequencer<S>>, SequenceError> {
        let store = self.store.get().ok_or(SequenceError::NotInitialized)?;
        let settings = Settings::resolve(options)?;

        schema.add_field(&settings.field, FieldKind::String);
        tracing::info!(
            model = %settings.model,
            field = %settings.field,
            start_at = settings.start_at,
            increment_by = settings.increment_by,
            "Attached sequence"
        );

        let sequencer = Arc::new(Sequencer::new(
            Arc::clone(store),
            settings,
            Arc::clone(&self.metrics),
        ));
        schema.pre_save(sequencer.clone());
        Ok(sequencer)
    }

    pub fn metrics(&self) -> Arc<SequenceMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl<S: CounterStore + 'static> Default for SequencePlugin<S> {
    fn default() -> Self {
        Self::new()
    }
}
