use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::contracts::{
    AffixError, Counter, CounterStore, Document, SaveHook, SequenceError, StorageError,
};
use crate::metrics::SequenceMetrics;
use crate::settings::Settings;

/// Assigns the next formatted sequence value to newly created documents.
///
/// Per new document: find or lazily create the counter, advance it, render
/// `prefix + count + suffix`, write the result to `settings.field`. The
/// document is only touched after the counter has been advanced.
pub struct Sequencer<S: CounterStore> {
    store: Arc<S>,
    settings: Settings,
    metrics: Arc<SequenceMetrics>,
}

impl<S: CounterStore> std::fmt::Debug for Sequencer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<S: CounterStore> Sequencer<S> {
    pub fn new(store: Arc<S>, settings: Settings, metrics: Arc<SequenceMetrics>) -> Self {
        Self {
            store,
            settings,
            metrics,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs sequencing for one save of `document`.
    ///
    /// Saves of existing documents (`is_new == false`) are left untouched.
    /// Any error is logged and returned; the caller must abort the save.
    pub async fn sequence(
        &self,
        document: &mut dyn Document,
        is_new: bool,
    ) -> Result<(), SequenceError> {
        if !is_new {
            self.metrics.record_skipped_update();
            tracing::trace!(
                model = %self.settings.model,
                field = %self.settings.field,
                "Existing document, sequencing skipped"
            );
            return Ok(());
        }

        match self.next_value(&*document).await {
            Ok(value) => {
                document.set(&self.settings.field, Value::String(value));
                Ok(())
            }
            Err(e) => {
                self.metrics.record_failure();
                tracing::error!(
                    model = %self.settings.model,
                    field = %self.settings.field,
                    error = %e,
                    "Failed to assign sequence value"
                );
                Err(e)
            }
        }
    }

    /// Advances the counter and renders the value for `document` without assigning it.
    pub async fn next_value(&self, document: &dyn Document) -> Result<String, SequenceError> {
        let started = Instant::now();

        let counter = self
            .acquire_counter()
            .await
            .map_err(|e| self.store_error(e))?;
        let count = self
            .store
            .advance(&counter, self.settings.increment_by)
            .await
            .map_err(|e| self.store_error(e))?;

        let prefix = self
            .settings
            .prefix
            .render(document)
            .await
            .map_err(|source| self.affix_error("prefix", source))?;
        let suffix = self
            .settings
            .suffix
            .render(document)
            .await
            .map_err(|source| self.affix_error("suffix", source))?;

        self.metrics.record_assigned(
            &self.settings.model,
            &self.settings.field,
            count,
            started.elapsed().as_micros() as u64,
        );
        tracing::debug!(
            model = %self.settings.model,
            field = %self.settings.field,
            count,
            "Advanced counter"
        );

        Ok(format!("{prefix}{count}{suffix}"))
    }

    /// Finds the counter, creating it on first use.
    ///
    /// A concurrent first use may create it between our lookup and insert;
    /// the resulting duplicate key means the counter now exists, so re-read it.
    async fn acquire_counter(&self) -> Result<Counter, StorageError> {
        let Settings { model, field, .. } = &self.settings;

        if let Some(counter) = self.store.find_counter(model, field).await? {
            return Ok(counter);
        }

        match self
            .store
            .create_counter(model, field, self.settings.initial_count())
            .await
        {
            Ok(counter) => {
                self.metrics.record_counter_created();
                tracing::info!(
                    model = %model,
                    field = %field,
                    start_at = self.settings.start_at,
                    "Created counter"
                );
                Ok(counter)
            }
            Err(StorageError::DuplicateKey { .. }) => {
                self.metrics.record_creation_race();
                tracing::debug!(
                    model = %model,
                    field = %field,
                    "Counter created concurrently, re-reading"
                );
                self.store
                    .find_counter(model, field)
                    .await?
                    .ok_or_else(|| StorageError::CounterNotFound {
                        model: model.clone(),
                        field: field.clone(),
                    })
            }
            Err(e) => Err(e),
        }
    }

    fn store_error(&self, source: StorageError) -> SequenceError {
        SequenceError::Store {
            model: self.settings.model.clone(),
            field: self.settings.field.clone(),
            source,
        }
    }

    fn affix_error(&self, part: &'static str, source: AffixError) -> SequenceError {
        SequenceError::Affix {
            model: self.settings.model.clone(),
            field: self.settings.field.clone(),
            part,
            source,
        }
    }
}

impl<S: CounterStore + 'static> SaveHook for Sequencer<S> {
    fn before_save<'a>(
        &'a self,
        document: &'a mut dyn Document,
        is_new: bool,
    ) -> BoxFuture<'a, Result<(), SequenceError>> {
        Box::pin(self.sequence(document, is_new))
    }
}
