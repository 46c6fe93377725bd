//! Difference Engine
//!
//! Compares two property snapshots key by key. Stream-like keys (streams
//! and sinks) and plain keys are diffed in separate passes because they are
//! reconciled differently: the first drives subscriptions, the second writes
//! straight into render state.
//!
//! # Rules
//!
//! - `added`: key in the current pass but not the previous one
//! - `removed`: key in the previous pass but not the current one
//! - `changed`: key in both, with a different classification or, for
//!   streams, a different resolved stream. Other values compare raw: data
//!   by value, functions and objects by reference.
//!
//! A key that moves between the stream-like and plain passes is removed
//! from one and added to the other. Keys that are identical in both
//! snapshots appear nowhere.

use smallvec::SmallVec;

use super::record::{PropertyRecord, PropertySet};
use crate::stream::same_stream;

/// Which records a diff pass looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Stream- and sink-classified records.
    StreamLike,
    /// Plain records.
    Plain,
}

impl Pass {
    fn includes(self, record: &PropertyRecord) -> bool {
        let stream_like = record.classification().is_stream_like();
        match self {
            Pass::StreamLike => stream_like,
            Pass::Plain => !stream_like,
        }
    }
}

pub type Keys = SmallVec<[String; 4]>;

/// Result of one diff pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub added: Keys,
    pub changed: Keys,
    pub removed: Keys,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.changed.len() + self.removed.len()
    }

    /// `added` followed by `changed`: the keys that need a fresh value.
    pub fn incoming(&self) -> impl Iterator<Item = &String> {
        self.added.iter().chain(self.changed.iter())
    }

    /// `changed` followed by `removed`: the keys whose old state must go.
    pub fn outgoing(&self) -> impl Iterator<Item = &String> {
        self.changed.iter().chain(self.removed.iter())
    }
}

/// Diff `prev` against `curr` over the records selected by `pass`.
pub fn diff(prev: &PropertySet, curr: &PropertySet, pass: Pass) -> Delta {
    let mut delta = Delta::default();

    for record in curr.iter().filter(|r| pass.includes(r)) {
        match prev.get(record.key()).filter(|p| pass.includes(p)) {
            None => delta.added.push(record.key().to_string()),
            Some(previous) if differs(previous, record) => {
                delta.changed.push(record.key().to_string())
            }
            Some(_) => {}
        }
    }

    for record in prev.iter().filter(|r| pass.includes(r)) {
        let still_present = curr
            .get(record.key())
            .map(|c| pass.includes(c))
            .unwrap_or(false);
        if !still_present {
            delta.removed.push(record.key().to_string());
        }
    }

    delta
}

fn differs(prev: &PropertyRecord, curr: &PropertyRecord) -> bool {
    if prev.classification() != curr.classification() {
        return true;
    }
    // Streams are keyed by the stream itself, not the value that exposed it
    match (prev.stream(), curr.stream()) {
        (Some(a), Some(b)) => !same_stream(a, b),
        _ => !prev.raw().same(curr.raw()),
    }
}
