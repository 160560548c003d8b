//! Validation and normalization of sequencing options.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use serde_json::{Map, Value};

use crate::contracts::{AffixError, Document, SequenceError};

/// Field written when no `field` option is given.
pub const DEFAULT_FIELD: &str = "no";
/// Primary identity field of the store; never usable as a sequence field.
pub const RESERVED_ID_FIELD: &str = "_id";

pub type AffixFuture = BoxFuture<'static, Result<String, AffixError>>;
type AffixFn = dyn Fn(&dyn Document) -> AffixFuture + Send + Sync;

/// Text placed before or after the rendered count.
#[derive(Clone)]
pub enum Affix {
    Literal(String),
    /// Derived from the document at sequencing time.
    Computed(Arc<AffixFn>),
}

impl Affix {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Computes the affix synchronously from the document.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&dyn Document) -> String + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(move |doc: &dyn Document| {
            future::ready(Ok::<_, AffixError>(f(doc))).boxed()
        }))
    }

    /// Computes the affix asynchronously.
    ///
    /// `f` reads what it needs from the document up front; the returned
    /// future must not borrow it.
    pub fn computed_async<F, Fut>(f: F) -> Self
    where
        F: Fn(&dyn Document) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, AffixError>> + Send + 'static,
    {
        Self::Computed(Arc::new(move |doc: &dyn Document| f(doc).boxed()))
    }

    /// Resolves the affix text for `document`.
    pub async fn render(&self, document: &dyn Document) -> Result<String, AffixError> {
        match self {
            Self::Literal(text) => Ok(text.clone()),
            Self::Computed(f) => f(document).await,
        }
    }
}

impl Default for Affix {
    fn default() -> Self {
        Self::Literal(String::new())
    }
}

impl fmt::Debug for Affix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<&str> for Affix {
    fn from(text: &str) -> Self {
        Self::Literal(text.to_string())
    }
}

impl From<String> for Affix {
    fn from(text: String) -> Self {
        Self::Literal(text)
    }
}

/// User-supplied options for one sequencing rule. Unset values take defaults.
#[derive(Clone, Debug, Default)]
pub struct SequenceOptions {
    pub model: Option<String>,
    pub field: Option<String>,
    pub start_at: Option<i64>,
    pub increment_by: Option<i64>,
    pub prefix: Option<Affix>,
    pub suffix: Option<Affix>,
}

impl SequenceOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Self::default()
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn start_at(mut self, start_at: i64) -> Self {
        self.start_at = Some(start_at);
        self
    }

    pub fn increment_by(mut self, increment_by: i64) -> Self {
        self.increment_by = Some(increment_by);
        self
    }

    pub fn prefix(mut self, prefix: impl Into<Affix>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn suffix(mut self, suffix: impl Into<Affix>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Reads options from a loosely typed JSON object.
    ///
    /// Recognized keys: `model`, `field`, `startAt`, `incrementBy`, `prefix`,
    /// `suffix`. `null` counts as absent; other keys are ignored. Computed
    /// affixes cannot be expressed in JSON, so `prefix`/`suffix` must be strings.
    pub fn from_value(value: &Value) -> Result<Self, SequenceError> {
        let object = value
            .as_object()
            .ok_or_else(|| SequenceError::config("options must be an object"))?;

        Ok(Self {
            model: string_option(object, "model")?,
            field: string_option(object, "field")?,
            start_at: integer_option(object, "startAt")?,
            increment_by: integer_option(object, "incrementBy")?,
            prefix: string_option(object, "prefix")?.map(Affix::Literal),
            suffix: string_option(object, "suffix")?.map(Affix::Literal),
        })
    }
}

fn present<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|v| !v.is_null())
}

fn string_option(object: &Map<String, Value>, key: &str) -> Result<Option<String>, SequenceError> {
    match present(object, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(SequenceError::config(format!(
            "'{key}' must be of type string"
        ))),
    }
}

fn integer_option(object: &Map<String, Value>, key: &str) -> Result<Option<i64>, SequenceError> {
    match present(object, key) {
        None => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or_else(|| {
            SequenceError::config(format!("'{key}' must be an integer, got {v}"))
        }),
    }
}

/// Validated, immutable configuration of one sequencing rule.
#[derive(Clone, Debug)]
pub struct Settings {
    pub model: String,
    pub field: String,
    pub start_at: i64,
    pub increment_by: i64,
    pub prefix: Affix,
    pub suffix: Affix,
}

impl Settings {
    /// Validates `options` and fills in defaults.
    pub fn resolve(options: SequenceOptions) -> Result<Self, SequenceError> {
        let model = match options.model {
            Some(model) if !model.is_empty() => model,
            _ => return Err(SequenceError::config("'model' must be set in options")),
        };

        let field = match options.field {
            Some(field) if field == RESERVED_ID_FIELD => {
                return Err(SequenceError::config(format!(
                    "'field' cannot be set as {RESERVED_ID_FIELD}"
                )))
            }
            Some(field) if !field.is_empty() => field,
            _ => DEFAULT_FIELD.to_string(),
        };

        let start_at = options.start_at.unwrap_or(0);
        let increment_by = options.increment_by.unwrap_or(1);
        if start_at.checked_sub(increment_by).is_none() {
            return Err(SequenceError::config(format!(
                "'startAt' {start_at} minus 'incrementBy' {increment_by} overflows"
            )));
        }
        if increment_by <= 0 {
            tracing::warn!(
                model = %model,
                field = %field,
                increment_by,
                "Non-positive increment, sequence will not increase"
            );
        }

        Ok(Self {
            model,
            field,
            start_at,
            increment_by,
            prefix: options.prefix.unwrap_or_default(),
            suffix: options.suffix.unwrap_or_default(),
        })
    }

    /// Count a freshly created counter starts at, so the first advance yields `start_at`.
    pub fn initial_count(&self) -> i64 {
        // Checked in resolve()
        self.start_at.wrapping_sub(self.increment_by)
    }
}
