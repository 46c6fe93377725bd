//! Error types.
//!
//! Only lifecycle misuse and configuration problems are errors. Unconnected
//! sinks, redundant unsubscribes and redundant key deletions are recovered
//! locally and reported through the logger instead.

use std::fmt;

use crate::adapter::Phase;

/// Errors returned by the lifecycle adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    /// A lifecycle hook was invoked from a phase that does not allow it.
    #[error("cannot {operation} an adapter that is {from}")]
    InvalidTransition {
        from: Phase,
        operation: &'static str,
    },
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown log level: {0:?}")]
    UnknownLogLevel(String),

    #[error("invalid adapter config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while choosing a scheduler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("no tokio runtime is running on this thread")]
    NoRuntime,

    /// Worker threads could run a deferred flush while the current turn is
    /// still writing, so one turn could publish more than once.
    #[error("tokio scheduler needs a current-thread runtime, found {0}")]
    UnsupportedRuntime(String),
}

/// Terminal failure signalled by a stream.
///
/// The adapter never retries or resubscribes after one of these; it hands
/// the error to the host's listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    message: String,
}

impl StreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StreamError {}

impl From<&str> for StreamError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for StreamError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_message_names_phase_and_operation() {
        let err = AdapterError::InvalidTransition {
            from: Phase::Detached,
            operation: "update",
        };
        assert_eq!(err.to_string(), "cannot update an adapter that is detached");
    }

    #[test]
    fn unsupported_runtime_names_flavor() {
        let err = SchedulerError::UnsupportedRuntime("MultiThread".to_string());
        assert_eq!(
            err.to_string(),
            "tokio scheduler needs a current-thread runtime, found MultiThread"
        );
    }

    #[test]
    fn stream_error_displays_message() {
        let err = StreamError::from("socket closed");
        assert_eq!(err.to_string(), "socket closed");
        assert_eq!(err.message(), "socket closed");
    }
}
