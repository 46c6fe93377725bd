//! Observers receive what a stream pushes.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::StreamError;

type NextFn = Arc<dyn Fn(Value) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(StreamError) + Send + Sync>;
type CompleteFn = Arc<dyn Fn() + Send + Sync>;

/// A partial observer: any of `next`, `error` and `complete` may be absent.
///
/// Missing callbacks are silently skipped.
#[derive(Clone, Default)]
pub struct Observer {
    next: Option<NextFn>,
    error: Option<ErrorFn>,
    complete: Option<CompleteFn>,
}

impl Observer {
    pub fn new() -> Self {
        Self::default()
    }

    /// An observer that only handles values.
    pub fn from_fn<F>(next: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        Self::new().on_next(next)
    }

    pub fn on_next<F>(mut self, next: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.next = Some(Arc::new(next));
        self
    }

    pub fn on_error<F>(mut self, error: F) -> Self
    where
        F: Fn(StreamError) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(error));
        self
    }

    pub fn on_complete<F>(mut self, complete: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.complete = Some(Arc::new(complete));
        self
    }

    /// True when at least one callback is present.
    pub fn is_callable(&self) -> bool {
        self.next.is_some() || self.error.is_some() || self.complete.is_some()
    }

    pub fn next(&self, value: Value) {
        if let Some(next) = &self.next {
            next(value);
        }
    }

    pub fn error(&self, error: StreamError) {
        if let Some(on_error) = &self.error {
            on_error(error);
        }
    }

    pub fn complete(&self) {
        if let Some(complete) = &self.complete {
            complete();
        }
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("next", &self.next.is_some())
            .field("error", &self.error.is_some())
            .field("complete", &self.complete.is_some())
            .finish()
    }
}
