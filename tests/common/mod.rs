//! Minimal host persistence framework for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use docseq::contracts::{Document, FieldKind, SaveHook, Schema, SequenceError};
use serde_json::{Map, Value};

/// A document that remembers whether it has been persisted.
#[derive(Debug, Default, Clone)]
pub struct Record {
    pub fields: Map<String, Value>,
    pub persisted: bool,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

impl Document for Record {
    fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }
}

/// Schema with a save pipeline that runs pre-save hooks in registration order.
#[derive(Default)]
pub struct TestSchema {
    pub fields: Vec<(String, FieldKind)>,
    hooks: Vec<Arc<dyn SaveHook>>,
}

impl TestSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves `record`: runs every hook, then marks it persisted.
    /// A failing hook aborts the save and leaves the record unpersisted.
    pub async fn save(&self, record: &mut Record) -> Result<(), SequenceError> {
        let is_new = !record.persisted;
        for hook in &self.hooks {
            hook.before_save(record, is_new).await?;
        }
        record.persisted = true;
        Ok(())
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }
}

impl Schema for TestSchema {
    fn add_field(&mut self, name: &str, kind: FieldKind) {
        self.fields.push((name.to_string(), kind));
    }

    fn pre_save(&mut self, hook: Arc<dyn SaveHook>) {
        self.hooks.push(hook);
    }
}
