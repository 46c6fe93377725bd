//! Adapter configuration.
//!
//! The serializable part of an adapter's setup. Collaborators that cannot
//! be serialized (streams, listeners, schedulers) are supplied through
//! [`AdapterBuilder`](crate::adapter::AdapterBuilder).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::logger::LogLevel;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Prefix for this adapter's info and debug log lines.
    pub debug_name: Option<String>,

    /// Threshold applied to the adapter's logger when it is built.
    ///
    /// Without an injected logger the adapter gets a console logger of its
    /// own at this level; [`Logger::global`](crate::logger::Logger::global)
    /// is left as it is. An injected logger is shared, so its threshold
    /// changes for everyone using it.
    pub log_level: Option<LogLevel>,

    /// Stream values rendered before any stream has delivered.
    pub default_values: IndexMap<String, Value>,
}

impl AdapterConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_debug_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = Some(name.into());
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn with_default_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_values.insert(key.into(), value.into());
        self
    }
}
