//! Propstream Core
//!
//! This crate binds push-based value streams to the render properties of a
//! synchronous UI component. It implements:
//!
//! - Capability-based classification of property values (stream, sink, plain)
//! - Key-by-key diffing of property snapshots
//! - A subscription ledger holding one live subscription per stream key
//! - A state aggregator that coalesces updates into single transitions
//! - A lifecycle adapter driven by attach/update/detach hooks
//! - A small leveled logger used for diagnostics throughout
//!
//! # Architecture
//!
//! - `stream`: stream, observer and subscription primitives
//! - `props`: property values, classification and diffing
//! - `adapter`: ledger, state aggregation, scheduling and the lifecycle
//! - `logger`: leveled logger and sinks
//! - `config`: serializable adapter configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use propstream_core::adapter::{AdapterBuilder, TurnQueue};
//! use propstream_core::props::Props;
//! use propstream_core::stream::Subject;
//!
//! let queue = TurnQueue::new();
//! let adapter = AdapterBuilder::new(listener, queue.clone()).build();
//!
//! let price = Subject::with_value(5);
//! adapter.attach(&Props::new().with("symbol", "ACME").with("price", price.clone()))?;
//! queue.run_turn();
//! // adapter.render() == { "symbol": "ACME", "price": 5 }
//!
//! price.next(6);
//! queue.run_turn();
//! // adapter.render() == { "symbol": "ACME", "price": 6 }
//!
//! adapter.detach()?;
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod logger;
pub mod props;
pub mod stream;

pub use adapter::{AdapterBuilder, RenderState, StateListener, StreamAdapter};
pub use config::AdapterConfig;
pub use error::{AdapterError, ConfigError, Result, SchedulerError, StreamError};
pub use logger::{LogLevel, Logger};
pub use props::{PropValue, Props};
