//! Property records: one classified entry per incoming key.

use indexmap::IndexMap;
use serde_json::Value;

use super::classify::{resolve, Classification, Resolved};
use super::value::{PropValue, Props};
use crate::stream::{Observer, StreamRef};

/// An incoming property after classification.
#[derive(Clone)]
pub struct PropertyRecord {
    key: String,
    raw: PropValue,
    resolved: Resolved,
}

impl PropertyRecord {
    pub fn new(key: impl Into<String>, raw: PropValue) -> Self {
        let resolved = resolve(&raw);
        Self {
            key: key.into(),
            raw,
            resolved,
        }
    }

    /// The property name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The value as it was passed in, used for identity comparison.
    pub fn raw(&self) -> &PropValue {
        &self.raw
    }

    pub fn classification(&self) -> Classification {
        self.resolved.classification()
    }

    /// The resolved stream, for `Stream` records.
    pub fn stream(&self) -> Option<&StreamRef> {
        match &self.resolved {
            Resolved::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    /// The resolved observer, for `Sink` records.
    pub fn sink(&self) -> Option<&Observer> {
        match &self.resolved {
            Resolved::Sink(observer) => Some(observer),
            _ => None,
        }
    }

    /// The data to render, for `Plain` records.
    pub fn data(&self) -> Option<&Value> {
        match &self.resolved {
            Resolved::Plain(value) => Some(value),
            _ => None,
        }
    }
}

impl std::fmt::Debug for PropertyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyRecord")
            .field("key", &self.key)
            .field("raw", &self.raw)
            .field("classification", &self.classification())
            .finish()
    }
}

/// The classified records of one property set, keyed by property name.
///
/// Retained between lifecycle passes as the snapshot the next pass is
/// diffed against.
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    records: IndexMap<String, PropertyRecord>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify every property once.
    pub fn from_props(props: &Props) -> Self {
        let records = props
            .iter()
            .map(|(key, value)| (key.clone(), PropertyRecord::new(key.clone(), value.clone())))
            .collect();
        Self { records }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyRecord> {
        self.records.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<PropertyRecord> for PropertySet {
    fn from_iter<I: IntoIterator<Item = PropertyRecord>>(iter: I) -> Self {
        let records = iter
            .into_iter()
            .map(|record| (record.key.clone(), record))
            .collect();
        Self { records }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Subject;

    #[test]
    fn records_are_classified_once() {
        let props = Props::new()
            .with("a", 1)
            .with("b", Subject::new())
            .with("c", PropValue::function(|_| {}));
        let set = PropertySet::from_props(&props);

        assert_eq!(set.len(), 3);
        assert_eq!(set.get("a").unwrap().classification(), Classification::Plain);
        assert_eq!(set.get("a").unwrap().data(), Some(&Value::from(1)));
        assert!(set.get("b").unwrap().stream().is_some());
        assert!(set.get("c").unwrap().sink().is_some());
    }

    #[test]
    fn empty_props_give_empty_set() {
        assert!(PropertySet::from_props(&Props::new()).is_empty());
    }
}
