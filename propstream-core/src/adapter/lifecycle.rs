//! Lifecycle Adapter
//!
//! Wires the difference engine, subscription ledger and state aggregator
//! into the three hooks a host UI framework calls: attach, update and
//! detach.
//!
//! ```text
//!   Unattached --attach--> Attached --detach--> Detached
//!                           |    ^
//!                           +----+ update
//! ```
//!
//! Detached is terminal. A host that mounts the component again builds a
//! new adapter.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::ledger::SubscriptionLedger;
use super::state::{RenderState, StateAggregator, StateChange, ValueMap};
use crate::error::{AdapterError, Result};
use crate::logger::{LogLevel, ScopedLogger};
use crate::props::{diff, Delta, Pass, PropValue, PropertySet, Props};
use crate::stream::StreamRef;

/// Lifecycle phase of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unattached,
    Attached,
    Detached,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Unattached => "unattached",
            Phase::Attached => "attached",
            Phase::Detached => "detached",
        };
        f.write_str(name)
    }
}

/// The wrapped component instance, addressable by member name.
///
/// Sink properties are attached to the stream the instance exposes under
/// the same key. Members are only ever looked up, never enumerated.
pub trait Component: Send + Sync {
    fn member(&self, key: &str) -> Option<PropValue>;
}

/// A component instance backed by a map of members.
#[derive(Debug, Clone, Default)]
pub struct Members {
    members: IndexMap<String, PropValue>,
}

impl Members {
    /// A component with no members.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member, replacing any previous one under `key`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.members.insert(key.into(), value.into());
        self
    }
}

impl Component for Members {
    fn member(&self, key: &str) -> Option<PropValue> {
        self.members.get(key).cloned()
    }
}

/// Binds streams in a component's properties to its render state.
pub struct StreamAdapter {
    /// Where the adapter is in its lifecycle.
    phase: Mutex<Phase>,

    /// Records from the last pass; the next pass is diffed against these.
    snapshot: Mutex<PropertySet>,

    /// Live and static subscriptions.
    ledger: SubscriptionLedger,

    /// Owner of the render state.
    state: StateAggregator,

    /// The wrapped component, searched for sink counterparts.
    instance: Option<Arc<dyn Component>>,

    /// Bound at attach regardless of props.
    static_streams: IndexMap<String, StreamRef>,

    log: ScopedLogger,
}

impl StreamAdapter {
    pub(crate) fn new(
        state: StateAggregator,
        instance: Option<Arc<dyn Component>>,
        static_streams: IndexMap<String, StreamRef>,
        log: ScopedLogger,
    ) -> Self {
        log.debug("constructing stream adapter");
        Self {
            phase: Mutex::new(Phase::Unattached),
            snapshot: Mutex::new(PropertySet::new()),
            ledger: SubscriptionLedger::new(log.clone()),
            state,
            instance,
            static_streams,
            log,
        }
    }

    /// Mount: start accepting updates, bind static streams, reconcile `props`.
    pub fn attach(&self, props: &Props) -> Result<()> {
        self.transition(Phase::Unattached, Phase::Attached, "attach")?;
        self.log.info("component did mount");
        if self.log.enabled(LogLevel::Debug) {
            self.log.debug(format_args!(
                "default state: {:?}",
                self.state.published().rendered_props()
            ));
        }

        self.state.set_accepting(true);
        for (key, stream) in &self.static_streams {
            self.ledger.subscribe_static(key, stream, &self.state);
        }
        self.reconcile(props);
        Ok(())
    }

    /// Reconcile a new property set against the previous one.
    pub fn update(&self, props: &Props) -> Result<()> {
        let phase = *self.phase.lock();
        if phase != Phase::Attached {
            return Err(AdapterError::InvalidTransition {
                from: phase,
                operation: "update",
            });
        }
        self.log.debug("component did update");
        self.reconcile(props);
        Ok(())
    }

    /// Unmount: cancel every subscription and stop publishing state.
    pub fn detach(&self) -> Result<()> {
        self.transition(Phase::Attached, Phase::Detached, "detach")?;
        self.log.info("component unmounting, cancelling all subscriptions");

        self.reconcile(&Props::new());
        self.state.set_accepting(false);
        self.ledger.cancel_all();
        Ok(())
    }

    /// The flat property map the wrapped component should render with.
    pub fn render(&self) -> ValueMap {
        let props = self.state.published().rendered_props();
        if self.log.enabled(LogLevel::Debug) {
            self.log.debug(format_args!("rendering with {} props", props.len()));
        }
        props
    }

    /// The last published render state.
    pub fn state(&self) -> RenderState {
        self.state.published()
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    /// Live per-key subscriptions, static streams excluded.
    pub fn live_subscriptions(&self) -> usize {
        self.ledger.live_count()
    }

    /// Subscriptions held for static streams.
    pub fn static_subscriptions(&self) -> usize {
        self.ledger.static_count()
    }

    /// True when `key` has a live subscription.
    pub fn is_subscribed(&self, key: &str) -> bool {
        self.ledger.is_tracking(key)
    }

    fn transition(&self, from: Phase, to: Phase, operation: &'static str) -> Result<()> {
        let mut phase = self.phase.lock();
        if *phase != from {
            return Err(AdapterError::InvalidTransition {
                from: *phase,
                operation,
            });
        }
        *phase = to;
        Ok(())
    }

    fn reconcile(&self, props: &Props) {
        let curr = PropertySet::from_props(props);
        let prev = std::mem::replace(&mut *self.snapshot.lock(), curr.clone());
        if self.log.enabled(LogLevel::Debug) {
            self.log.debug(format_args!("detecting changes for {} props", curr.len()));
        }

        let streams = diff(&prev, &curr, Pass::StreamLike);
        if !streams.is_empty() {
            self.log.info("detected stream changes");
            self.log_delta(&streams);
        }
        let unconnected = self.ledger.reconcile(
            &streams,
            &prev,
            &curr,
            &self.state,
            self.instance.as_deref(),
        );
        if !unconnected.is_empty() && self.log.enabled(LogLevel::Debug) {
            self.log
                .debug(format_args!("sinks left unconnected: {unconnected:?}"));
        }

        let plain = diff(&prev, &curr, Pass::Plain);
        if plain.is_empty() {
            return;
        }
        self.log.info("detected plain prop changes");
        self.log_delta(&plain);

        let changes = plain
            .incoming()
            .filter_map(|key| {
                let data = curr.get(key)?.data()?.clone();
                Some(StateChange::SetPlain(key.clone(), data))
            })
            .chain(
                plain
                    .removed
                    .iter()
                    .map(|key| StateChange::RemovePlain(key.clone())),
            )
            .collect::<Vec<_>>();
        self.state.update(changes);
    }

    fn log_delta(&self, delta: &Delta) {
        if self.log.enabled(LogLevel::Debug) {
            self.log.debug(format_args!(
                "changes: added {:?}, changed {:?}, removed {:?}",
                delta.added, delta.changed, delta.removed
            ));
        }
    }
}

impl fmt::Debug for StreamAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamAdapter")
            .field("phase", &self.phase())
            .field("ledger", &self.ledger)
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for StreamAdapter {
    fn drop(&mut self) {
        // Dropped while attached: release everything without a final pass
        if self.phase() == Phase::Attached {
            self.state.set_accepting(false);
            self.ledger.cancel_all();
        }
    }
}
