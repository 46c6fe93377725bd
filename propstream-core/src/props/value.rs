//! Dynamic property values.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::stream::{Observer, StreamRef, Subject};

/// A value handed to the adapter whose shape is only known at runtime.
///
/// Implementors advertise capabilities; they are never matched by type.
pub trait PropObject: Send + Sync {
    /// The stream this object can be subscribed to, if any.
    fn as_stream(&self) -> Option<StreamRef> {
        None
    }

    /// The observer callbacks this object exposes, if any.
    fn as_observer(&self) -> Option<Observer> {
        None
    }

    /// Plain data to render when the object is neither stream nor sink.
    fn as_data(&self) -> Value {
        Value::Null
    }
}

impl PropObject for Subject {
    fn as_stream(&self) -> Option<StreamRef> {
        Some(self.to_stream())
    }
}

/// Observers are property objects exposing `next`/`error`/`complete`.
impl PropObject for Observer {
    fn as_observer(&self) -> Option<Observer> {
        Some(self.clone())
    }
}

type Callback = Arc<dyn Fn(Value) + Send + Sync>;

/// An incoming property value.
#[derive(Clone)]
pub enum PropValue {
    /// Plain data, compared by value.
    Data(Value),
    /// A bare function, compared by pointer.
    Function(Callback),
    /// A capability-bearing object, compared by pointer.
    Object(Arc<dyn PropObject>),
}

impl PropValue {
    /// Wrap a callback; it classifies as a sink.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        PropValue::Function(Arc::new(f))
    }

    /// Wrap a capability-bearing object.
    pub fn object<O>(object: O) -> Self
    where
        O: PropObject + 'static,
    {
        PropValue::Object(Arc::new(object))
    }

    /// Wrap a stream handle so it is recognised by its `subscribe` capability.
    pub fn stream(stream: StreamRef) -> Self {
        PropValue::Object(Arc::new(StreamObject(stream)))
    }

    /// Identity comparison: data by value, functions and objects by pointer.
    pub fn same(&self, other: &PropValue) -> bool {
        match (self, other) {
            (PropValue::Data(a), PropValue::Data(b)) => a == b,
            (PropValue::Function(a), PropValue::Function(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (PropValue::Object(a), PropValue::Object(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Data(v) => f.debug_tuple("Data").field(v).finish(),
            PropValue::Function(_) => f.write_str("Function(..)"),
            PropValue::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl From<Value> for PropValue {
    fn from(value: Value) -> Self {
        PropValue::Data(value)
    }
}

macro_rules! data_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for PropValue {
            fn from(value: $ty) -> Self {
                PropValue::Data(Value::from(value))
            }
        })*
    };
}

data_from!(bool, i32, i64, u32, u64, f64, &str, String);

impl From<Observer> for PropValue {
    fn from(observer: Observer) -> Self {
        PropValue::object(observer)
    }
}

impl From<Subject> for PropValue {
    fn from(subject: Subject) -> Self {
        PropValue::object(subject)
    }
}

struct StreamObject(StreamRef);

impl PropObject for StreamObject {
    fn as_stream(&self) -> Option<StreamRef> {
        Some(self.0.clone())
    }
}

/// An ordered bag of incoming properties.
#[derive(Debug, Clone, Default)]
pub struct Props {
    values: IndexMap<String, PropValue>,
}

impl Props {
    /// An empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set `key`, keeping its position if it was already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Remove `key`, preserving the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<PropValue> {
        self.values.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.values.get(key)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropValue)> {
        self.values.iter()
    }
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Props::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_compares_by_value() {
        assert!(PropValue::from(1).same(&PropValue::from(1)));
        assert!(!PropValue::from(1).same(&PropValue::from(2)));
        assert!(!PropValue::from("1").same(&PropValue::from(1)));
    }

    #[test]
    fn functions_compare_by_pointer() {
        let f = PropValue::function(|_| {});
        let g = PropValue::function(|_| {});
        assert!(f.same(&f.clone()));
        assert!(!f.same(&g));
    }

    #[test]
    fn objects_compare_by_pointer() {
        let subject = Subject::new();
        let a = PropValue::from(subject.clone());
        let b = PropValue::from(subject);
        assert!(a.same(&a.clone()));
        // Two wrappers around one subject are distinct values
        assert!(!a.same(&b));
    }

    #[test]
    fn props_keep_insertion_order() {
        let props = Props::new().with("b", 1).with("a", 2).with("b", 3);
        let keys: Vec<_> = props.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert!(props.get("b").unwrap().same(&PropValue::from(3)));
    }
}
