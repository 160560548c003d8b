//! Narrow interfaces to the host persistence framework.
//!
//! The host owns documents, schemas and the save pipeline. Sequencing only
//! needs to read a document, write one field on it, declare that field on a
//! schema and occupy the "before save" step of the pipeline.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::contracts::error::SequenceError;

/// A document about to be persisted.
pub trait Document: Send + Sync {
    /// Returns the value of `field`, if set.
    fn get(&self, field: &str) -> Option<&Value>;

    /// Sets `field` to `value`, replacing any previous value.
    fn set(&mut self, field: &str, value: Value);

    /// Returns the value of `field` if it is a string.
    fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }
}

impl Document for Map<String, Value> {
    fn get(&self, field: &str) -> Option<&Value> {
        Map::get(self, field)
    }

    fn set(&mut self, field: &str, value: Value) {
        self.insert(field.to_string(), value);
    }
}

/// Type of a field declared on a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum FieldKind {
    String,
}

/// Schema declaration surface of the host.
pub trait Schema {
    /// Declares a field on the schema.
    fn add_field(&mut self, name: &str, kind: FieldKind);

    /// Registers a hook that runs before every save of a document of this schema.
    fn pre_save(&mut self, hook: Arc<dyn SaveHook>);
}

/// A step in the host's save pipeline.
///
/// An `Err` aborts the save; the document must not be persisted.
pub trait SaveHook: Send + Sync {
    fn before_save<'a>(
        &'a self,
        document: &'a mut dyn Document,
        is_new: bool,
    ) -> BoxFuture<'a, Result<(), SequenceError>>;
}
