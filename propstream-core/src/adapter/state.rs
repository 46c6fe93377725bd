//! State Aggregator
//!
//! Holds the render state behind a single mutation point and publishes it
//! to the host.
//!
//! # Partitions
//!
//! [`RenderState`] keeps plain property values and stream-delivered values
//! in two maps. Each map sits behind an `Arc` and is replaced, never mutated
//! in place, so "did anything change" is a pointer comparison.
//!
//! # Coalescing
//!
//! Every [`StateAggregator::update`] writes into the pending state. The
//! first write in a turn defers one flush through the [`Scheduler`]; later
//! writes in the same turn ride along. The flush publishes the pending
//! state once, or not at all when both partitions are still the ones last
//! published.
//!
//! # Teardown
//!
//! While the aggregator is not accepting updates, writes are dropped and a
//! flush that was already queued publishes nothing.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;

use super::scheduler::Scheduler;
use crate::error::StreamError;
use crate::logger::{LogLevel, ScopedLogger};

pub type ValueMap = IndexMap<String, Value>;

/// The merged key/value state fed to the wrapped component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderState {
    plain: Arc<ValueMap>,
    streams: Arc<ValueMap>,
}

impl RenderState {
    pub fn new(plain: ValueMap, streams: ValueMap) -> Self {
        Self {
            plain: Arc::new(plain),
            streams: Arc::new(streams),
        }
    }

    pub fn plain_values(&self) -> &ValueMap {
        &self.plain
    }

    pub fn stream_values(&self) -> &ValueMap {
        &self.streams
    }

    /// Plain values overlaid with stream values; streams win on collision.
    pub fn rendered_props(&self) -> ValueMap {
        let mut props = (*self.plain).clone();
        for (key, value) in self.streams.iter() {
            props.insert(key.clone(), value.clone());
        }
        props
    }

    /// True when both partitions are the very same maps as `other`'s.
    pub fn same_as(&self, other: &RenderState) -> bool {
        Arc::ptr_eq(&self.plain, &other.plain) && Arc::ptr_eq(&self.streams, &other.streams)
    }
}

/// One write into the render state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    SetPlain(String, Value),
    SetStream(String, Value),
    RemovePlain(String),
    RemoveStream(String),
}

/// Receives published state and stream failures.
pub trait StateListener: Send + Sync {
    /// A coalesced state transition. The host re-renders from `state`.
    fn state_changed(&self, state: &RenderState);

    /// A bound stream signalled a terminal error.
    fn stream_failed(&self, key: &str, error: &StreamError);
}

struct Pending {
    /// Every write so far, flushed or not.
    state: RenderState,

    /// What the listener last saw.
    published: RenderState,

    /// A flush is queued on the scheduler.
    flush_scheduled: bool,

    /// Off before attach and after detach; writes are dropped meanwhile.
    accepting: bool,
}

struct Shared {
    pending: Mutex<Pending>,

    /// Runs the deferred flush.
    scheduler: Arc<dyn Scheduler>,

    /// Receives each published state and every stream failure.
    listener: Arc<dyn StateListener>,

    log: ScopedLogger,
}

/// The single owner of an adapter's render state.
#[derive(Clone)]
pub struct StateAggregator {
    shared: Arc<Shared>,
}

impl StateAggregator {
    /// Create an aggregator seeded with `initial`, not yet accepting updates.
    pub fn new(
        initial: RenderState,
        scheduler: Arc<dyn Scheduler>,
        listener: Arc<dyn StateListener>,
        log: ScopedLogger,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(Pending {
                    published: initial.clone(),
                    state: initial,
                    flush_scheduled: false,
                    accepting: false,
                }),
                scheduler,
                listener,
                log,
            }),
        }
    }

    /// Open or close the gate for writes and flushes.
    pub fn set_accepting(&self, accepting: bool) {
        self.shared.pending.lock().accepting = accepting;
    }

    /// The state as last published to the listener.
    pub fn published(&self) -> RenderState {
        self.shared.pending.lock().published.clone()
    }

    /// The state including writes not yet flushed.
    pub fn pending(&self) -> RenderState {
        self.shared.pending.lock().state.clone()
    }

    /// Record a value delivered by the stream bound to `key`.
    pub fn deliver(&self, key: &str, value: Value) {
        let log = &self.shared.log;
        if log.enabled(LogLevel::Debug) {
            log.debug(format_args!("received stream value [{key}]: {value}"));
        }
        self.update([StateChange::SetStream(key.to_string(), value)]);
    }

    /// Hand a stream failure to the host.
    pub fn report_error(&self, key: &str, error: &StreamError) {
        self.shared
            .log
            .error(format_args!("stream [{key}] failed: {error}"));
        self.shared.listener.stream_failed(key, error);
    }

    /// Apply `changes` to the pending state and schedule a flush.
    pub fn update(&self, changes: impl IntoIterator<Item = StateChange>) {
        let mut missing = Vec::new();
        let schedule = {
            let mut pending = self.shared.pending.lock();
            if !pending.accepting {
                drop(pending);
                self.shared.log.debug("dropping state update: not accepting updates");
                return;
            }

            // Partitions are copied on first write; an untouched partition
            // keeps its identity.
            let mut plain: Option<ValueMap> = None;
            let mut streams: Option<ValueMap> = None;
            let (mut plain_dirty, mut streams_dirty) = (false, false);
            for change in changes {
                match change {
                    StateChange::SetPlain(key, value) => {
                        plain
                            .get_or_insert_with(|| (*pending.state.plain).clone())
                            .insert(key, value);
                        plain_dirty = true;
                    }
                    StateChange::SetStream(key, value) => {
                        streams
                            .get_or_insert_with(|| (*pending.state.streams).clone())
                            .insert(key, value);
                        streams_dirty = true;
                    }
                    StateChange::RemovePlain(key) => {
                        let map = plain.get_or_insert_with(|| (*pending.state.plain).clone());
                        if map.shift_remove(&key).is_some() {
                            plain_dirty = true;
                        } else {
                            missing.push(("plainValues", key));
                        }
                    }
                    StateChange::RemoveStream(key) => {
                        let map =
                            streams.get_or_insert_with(|| (*pending.state.streams).clone());
                        if map.shift_remove(&key).is_some() {
                            streams_dirty = true;
                        } else {
                            missing.push(("streamValues", key));
                        }
                    }
                }
            }

            if let Some(map) = plain.filter(|_| plain_dirty) {
                pending.state.plain = Arc::new(map);
            }
            if let Some(map) = streams.filter(|_| streams_dirty) {
                pending.state.streams = Arc::new(map);
            }

            if pending.flush_scheduled {
                false
            } else {
                pending.flush_scheduled = true;
                true
            }
        };

        for (partition, key) in missing {
            self.shared
                .log
                .warning(format_args!("'{partition}' has no key [{key}] to delete"));
        }

        if schedule {
            let this = self.clone();
            self.shared.scheduler.defer(Box::new(move || this.flush()));
        }
    }

    /// Publish the pending state if it differs from the last publication.
    ///
    /// Normally called by the deferred task scheduled in [`update`](Self::update).
    pub fn flush(&self) {
        let state = {
            let mut pending = self.shared.pending.lock();
            pending.flush_scheduled = false;
            if !pending.accepting {
                return;
            }
            if pending.state.same_as(&pending.published) {
                return;
            }
            pending.published = pending.state.clone();
            pending.published.clone()
        };

        let log = &self.shared.log;
        log.info("updating state");
        if log.enabled(LogLevel::Debug) {
            log.debug(format_args!("state: {:?}", state.rendered_props()));
        }
        self.shared.listener.state_changed(&state);
    }
}

impl std::fmt::Debug for StateAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.shared.pending.lock();
        f.debug_struct("StateAggregator")
            .field("pending", &pending.state)
            .field("published", &pending.published)
            .field("flush_scheduled", &pending.flush_scheduled)
            .field("accepting", &pending.accepting)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
