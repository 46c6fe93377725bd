//! Leveled Logger
//!
//! A small diagnostics logger with an ordinal verbosity threshold. A message
//! at level `L` is written only when the logger's threshold is at least `L`.
//!
//! # Sinks
//!
//! Formatting and output belong to a [`LogSink`]. Three are provided:
//!
//! - [`ConsoleSink`]: timestamped, level-tagged lines on stdout/stderr
//! - [`TracingSink`]: forwards each line as a `tracing` event
//! - [`MemorySink`]: keeps lines in memory for inspection
//!
//! # Global Instance
//!
//! [`Logger::global`] returns a process-wide logger writing to the console.
//! Its threshold comes from `PROPSTREAM_LOG` and defaults to
//! [`LogLevel::None`]. Adapters take an
//! `Arc<Logger>` so hosts and tests can inject their own.

use std::fmt::{self, Display};
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable read by [`Logger::level_from_env`].
pub const LOG_LEVEL_ENV: &str = "PROPSTREAM_LOG";

/// Verbosity levels, ordered by their discriminant.
///
/// Serialized as the lowercase name. Deserialized through [`FromStr`], so
/// config files accept the same spellings as [`LOG_LEVEL_ENV`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
#[repr(u8)]
pub enum LogLevel {
    None = 0,
    Error = 1,
    Warning = 2,
    Info = 3,
    Debug = 4,
}

impl LogLevel {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LogLevel::None,
            1 => LogLevel::Error,
            2 => LogLevel::Warning,
            3 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }

    /// The bracketed tag written in front of each line.
    ///
    /// Lines written at `None` (through [`Logger::log`]) carry no tag.
    pub fn tag(self) -> &'static str {
        match self {
            LogLevel::None => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warning => "[WARNING]",
            LogLevel::Info => "[INFO]",
            LogLevel::Debug => "[DEBUG]",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::None => "none",
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" | "0" => Ok(LogLevel::None),
            "error" | "1" => Ok(LogLevel::Error),
            "warning" | "warn" | "2" => Ok(LogLevel::Warning),
            "info" | "3" => Ok(LogLevel::Info),
            "debug" | "4" => Ok(LogLevel::Debug),
            _ => Err(ConfigError::UnknownLogLevel(s.to_string())),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, <LogLevel as TryFrom<String>>::Error> {
        value.parse()
    }
}

/// Destination for log lines that passed the threshold.
pub trait LogSink: Send + Sync {
    fn write(&self, level: LogLevel, message: &str);
}

/// Format a line the way [`ConsoleSink`] prints it.
///
/// Tags shorter than eight characters are separated from the timestamp by a
/// tab, longer ones by a single space.
pub fn format_line(level: LogLevel, time: DateTime<Local>, message: &str) -> String {
    let tag = level.tag();
    let sep = if tag.len() < 8 { '\t' } else { ' ' };
    format!(
        "{tag}{sep}[{}]{sep}{message}",
        time.format("%H:%M:%S%.3f")
    )
}

/// Writes timestamped lines to stderr (errors, warnings) or stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn write(&self, level: LogLevel, message: &str) {
        let line = format_line(level, Local::now(), message);
        // Output failures are ignored; logging never fails the caller.
        let _ = match level {
            LogLevel::Error | LogLevel::Warning => writeln!(std::io::stderr().lock(), "{line}"),
            _ => writeln!(std::io::stdout().lock(), "{line}"),
        };
    }
}

/// Forwards lines to the `tracing` ecosystem.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error => tracing::error!("{message}"),
            LogLevel::Warning => tracing::warn!("{message}"),
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Debug => tracing::debug!("{message}"),
            LogLevel::None => tracing::trace!("{message}"),
        }
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().clone()
    }

    /// Messages written at exactly `level`.
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn write(&self, level: LogLevel, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }
}

/// A leveled logger.
pub struct Logger {
    threshold: AtomicU8,
    sink: Arc<dyn LogSink>,
}

static GLOBAL: OnceLock<Arc<Logger>> = OnceLock::new();

impl Logger {
    pub fn new(threshold: LogLevel, sink: Arc<dyn LogSink>) -> Self {
        Self {
            threshold: AtomicU8::new(threshold as u8),
            sink,
        }
    }

    /// The process-wide default logger.
    pub fn global() -> Arc<Logger> {
        GLOBAL
            .get_or_init(|| {
                let level = match Self::level_from_env() {
                    Ok(level) => level.unwrap_or(LogLevel::None),
                    Err(err) => {
                        eprintln!("{err}, logging disabled");
                        LogLevel::None
                    }
                };
                Arc::new(Logger::new(level, Arc::new(ConsoleSink)))
            })
            .clone()
    }

    /// Read the threshold from [`LOG_LEVEL_ENV`], if set.
    pub fn level_from_env() -> Result<Option<LogLevel>, ConfigError> {
        match std::env::var(LOG_LEVEL_ENV) {
            Ok(raw) => raw.parse().map(Some),
            Err(_) => Ok(None),
        }
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.threshold.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, level: LogLevel) {
        self.threshold.store(level as u8, Ordering::Relaxed);
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        self.level() >= level
    }

    pub fn error(&self, message: impl Display) {
        self.write(LogLevel::Error, message);
    }

    pub fn warning(&self, message: impl Display) {
        self.write(LogLevel::Warning, message);
    }

    pub fn info(&self, message: impl Display) {
        self.write(LogLevel::Info, message);
    }

    pub fn debug(&self, message: impl Display) {
        self.write(LogLevel::Debug, message);
    }

    /// Untagged line; always written.
    pub fn log(&self, message: impl Display) {
        self.write(LogLevel::None, message);
    }

    fn write(&self, level: LogLevel, message: impl Display) {
        if !self.enabled(level) {
            return;
        }
        self.sink.write(level, &message.to_string());
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level())
            .finish()
    }
}

/// A logger handle that prefixes info and debug lines with a name.
///
/// Errors and warnings are written unprefixed.
#[derive(Debug, Clone)]
pub struct ScopedLogger {
    logger: Arc<Logger>,
    name: Option<String>,
}

impl ScopedLogger {
    pub fn new(logger: Arc<Logger>, name: Option<String>) -> Self {
        Self {
            logger,
            name: name.filter(|n| !n.is_empty()),
        }
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    pub fn error(&self, message: impl Display) {
        self.logger.error(message);
    }

    pub fn warning(&self, message: impl Display) {
        self.logger.warning(message);
    }

    pub fn info(&self, message: impl Display) {
        self.scoped(LogLevel::Info, message);
    }

    pub fn debug(&self, message: impl Display) {
        self.scoped(LogLevel::Debug, message);
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        self.logger.enabled(level)
    }

    fn scoped(&self, level: LogLevel, message: impl Display) {
        match &self.name {
            Some(name) => self.logger.write(level, format_args!("{name} {message}")),
            None => self.logger.write(level, message),
        }
    }
}
