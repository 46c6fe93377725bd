//! Assembles a [`StreamAdapter`] from config and collaborators.

use std::sync::Arc;

use indexmap::IndexMap;

use super::lifecycle::{Component, StreamAdapter};
use super::scheduler::Scheduler;
use super::state::{RenderState, StateAggregator, StateListener, ValueMap};
use crate::config::AdapterConfig;
use crate::logger::{ConsoleSink, Logger, ScopedLogger};
use crate::stream::StreamRef;

/// Builder for [`StreamAdapter`].
///
/// # Example
///
/// ```rust,ignore
/// let queue = TurnQueue::new();
/// let ticker = Subject::with_value(100);
///
/// let adapter = AdapterBuilder::new(listener, queue.clone())
///     .config(AdapterConfig::default().with_debug_name("Ticker"))
///     .static_stream("price", ticker.to_stream())
///     .build();
///
/// adapter.attach(&Props::new().with("symbol", "ACME"))?;
/// queue.run_turn();
/// ```
pub struct AdapterBuilder {
    listener: Arc<dyn StateListener>,
    scheduler: Arc<dyn Scheduler>,
    config: AdapterConfig,
    instance: Option<Arc<dyn Component>>,
    static_streams: IndexMap<String, StreamRef>,
    logger: Option<Arc<Logger>>,
}

impl AdapterBuilder {
    pub fn new(listener: Arc<dyn StateListener>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            listener,
            scheduler,
            config: AdapterConfig::default(),
            instance: None,
            static_streams: IndexMap::new(),
            logger: None,
        }
    }

    pub fn config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    /// The wrapped component instance that sink properties attach to.
    pub fn instance(mut self, instance: Arc<dyn Component>) -> Self {
        self.instance = Some(instance);
        self
    }

    /// A stream bound for the whole attached lifetime, independent of props.
    pub fn static_stream(mut self, key: impl Into<String>, stream: StreamRef) -> Self {
        self.static_streams.insert(key.into(), stream);
        self
    }

    /// Use `logger` instead of [`Logger::global`].
    ///
    /// A configured `log_level` is applied to this logger, and so to every
    /// adapter sharing it.
    pub fn logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> StreamAdapter {
        let logger = match (self.logger, self.config.log_level) {
            (Some(logger), level) => {
                if let Some(level) = level {
                    logger.set_level(level);
                }
                logger
            }
            // A private console logger, so the global threshold stays untouched
            (None, Some(level)) => Arc::new(Logger::new(level, Arc::new(ConsoleSink))),
            (None, None) => Logger::global(),
        };
        let log = ScopedLogger::new(logger, self.config.debug_name);

        let initial = RenderState::new(ValueMap::new(), self.config.default_values);
        let state = StateAggregator::new(initial, self.scheduler, self.listener, log.clone());
        StreamAdapter::new(state, self.instance, self.static_streams, log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::scheduler::TurnQueue;
    use crate::error::StreamError;
    use crate::logger::{LogLevel, MemorySink};
    use crate::props::Props;
    use serde_json::Value;

    struct Quiet;

    impl StateListener for Quiet {
        fn state_changed(&self, _state: &RenderState) {}
        fn stream_failed(&self, _key: &str, _error: &StreamError) {}
    }

    fn builder() -> AdapterBuilder {
        AdapterBuilder::new(Arc::new(Quiet), TurnQueue::new())
    }

    #[test]
    fn configured_level_leaves_global_logger_alone() {
        let before = Logger::global().level();
        let target = if before == LogLevel::Debug {
            LogLevel::Error
        } else {
            LogLevel::Debug
        };

        let _adapter = builder()
            .config(AdapterConfig::default().with_log_level(target))
            .build();

        assert_eq!(Logger::global().level(), before);
    }

    #[test]
    fn configured_level_applies_to_injected_logger() {
        let sink = MemorySink::new();
        let logger = Arc::new(Logger::new(LogLevel::None, sink.clone()));

        let adapter = builder()
            .config(
                AdapterConfig::default()
                    .with_debug_name("Ticker")
                    .with_log_level(LogLevel::Info),
            )
            .logger(logger.clone())
            .build();
        adapter.attach(&Props::new()).unwrap();

        assert_eq!(logger.level(), LogLevel::Info);
        assert_eq!(
            sink.messages(LogLevel::Info),
            vec!["Ticker component did mount".to_string()]
        );
    }

    #[test]
    fn default_values_seed_stream_values() {
        let adapter = builder()
            .config(AdapterConfig::default().with_default_value("price", 0))
            .build();

        assert_eq!(adapter.render().get("price"), Some(&Value::from(0)));
        assert!(adapter.state().plain_values().is_empty());
    }
}
