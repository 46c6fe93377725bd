//! Stream Classifier
//!
//! Decides, purely from the capabilities a value exposes, whether it is a
//! stream to subscribe to, a sink to attach to one of the wrapped
//! component's streams, or plain data. This is the only place in the crate
//! that inspects the shape of a property value.

use serde_json::Value;

use super::value::PropValue;
use crate::stream::{Observer, StreamRef};

/// How a property value takes part in reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Exposes `subscribe`.
    Stream,
    /// A function, or an object exposing any of `next`/`error`/`complete`.
    Sink,
    /// Anything else.
    Plain,
}

impl Classification {
    /// Streams and sinks both hold a subscription once connected.
    pub fn is_stream_like(self) -> bool {
        !matches!(self, Classification::Plain)
    }
}

/// A property value together with the capability that classified it.
#[derive(Clone)]
pub enum Resolved {
    Stream(StreamRef),
    Sink(Observer),
    Plain(Value),
}

impl Resolved {
    pub fn classification(&self) -> Classification {
        match self {
            Resolved::Stream(_) => Classification::Stream,
            Resolved::Sink(_) => Classification::Sink,
            Resolved::Plain(_) => Classification::Plain,
        }
    }
}

/// Classify a value without keeping the resolved capability.
pub fn classify(value: &PropValue) -> Classification {
    resolve(value).classification()
}

/// Classify a value and extract the capability it was classified by.
///
/// A stream capability wins over observer callbacks when an object exposes
/// both.
pub fn resolve(value: &PropValue) -> Resolved {
    match value {
        PropValue::Data(v) => Resolved::Plain(v.clone()),
        PropValue::Function(f) => {
            let f = f.clone();
            Resolved::Sink(Observer::from_fn(move |v| f(v)))
        }
        PropValue::Object(object) => {
            if let Some(stream) = object.as_stream() {
                return Resolved::Stream(stream);
            }
            match object.as_observer() {
                Some(observer) if observer.is_callable() => Resolved::Sink(observer),
                _ => Resolved::Plain(object.as_data()),
            }
        }
    }
}
