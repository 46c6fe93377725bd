//! Subscription Ledger
//!
//! Tracks the one live subscription per stream-like property key and the
//! subscriptions to static streams.
//!
//! # Reconciliation
//!
//! For a diff of the stream-like pass:
//!
//! 1. every `changed` and `removed` key has its subscription cancelled
//! 2. every `added` and `changed` key is connected afresh
//! 3. every `removed` stream key has its delivered value deleted
//!
//! All cancellations happen before any new subscription is made, so two
//! live subscriptions for one key never coexist.
//!
//! # Locking
//!
//! The ledger lock is never held while subscribing or cancelling. Streams
//! are free to deliver synchronously from inside `subscribe`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::lifecycle::Component;
use super::state::{StateAggregator, StateChange};
use crate::logger::ScopedLogger;
use crate::props::{resolve, Classification, Delta, PropertyRecord, PropertySet, Resolved};
use crate::stream::{Observer, StreamRef, Subscription};

/// Owns every subscription an adapter holds.
pub struct SubscriptionLedger {
    /// One subscription per connected stream or sink key.
    live: Mutex<IndexMap<String, Subscription>>,

    /// Static stream subscriptions, cancelled only by `cancel_all`.
    statics: Mutex<Vec<(String, Subscription)>>,

    log: ScopedLogger,
}

impl SubscriptionLedger {
    /// An empty ledger reporting through `log`.
    pub fn new(log: ScopedLogger) -> Self {
        Self {
            live: Mutex::new(IndexMap::new()),
            statics: Mutex::new(Vec::new()),
            log,
        }
    }

    /// Apply a stream-like diff. Returns the keys left unconnected.
    pub fn reconcile(
        &self,
        delta: &Delta,
        prev: &PropertySet,
        curr: &PropertySet,
        state: &StateAggregator,
        instance: Option<&dyn Component>,
    ) -> Vec<String> {
        for key in delta.outgoing() {
            self.cancel(key);
        }

        let mut unconnected = Vec::new();
        for key in delta.incoming() {
            let Some(record) = curr.get(key) else {
                continue;
            };
            match self.connect(record, state, instance) {
                Some(subscription) => self.track(key, subscription),
                None => unconnected.push(key.clone()),
            }
        }

        // A key that stops being a stream loses its delivered value. A key
        // whose stream was merely swapped keeps it until the new one delivers.
        let stale: Vec<StateChange> = delta
            .outgoing()
            .filter(|key| is_stream(prev, key) && !is_stream(curr, key))
            .map(|key| StateChange::RemoveStream(key.clone()))
            .collect();
        if !stale.is_empty() {
            state.update(stale);
        }

        unconnected
    }

    /// Subscribe to a static stream for the adapter's attached lifetime.
    pub fn subscribe_static(&self, key: &str, stream: &StreamRef, state: &StateAggregator) {
        self.log.debug(format_args!("subscribing to static stream [{key}]"));
        let subscription = bind_stream(key, stream, state);
        self.statics.lock().push((key.to_string(), subscription));
    }

    /// Cancel and forget the subscription for `key`.
    ///
    /// Returns false, and logs a warning, when none was tracked.
    pub fn cancel(&self, key: &str) -> bool {
        let removed = self.live.lock().shift_remove(key);
        match removed {
            Some(subscription) => {
                self.log.info(format_args!("unsubscribing from prop [{key}]"));
                subscription.cancel();
                true
            }
            None => {
                self.log
                    .warning(format_args!("no subscription found for [{key}]"));
                false
            }
        }
    }

    /// Cancel everything, static subscriptions included, and clear the ledger.
    pub fn cancel_all(&self) {
        let live = std::mem::take(&mut *self.live.lock());
        let statics = std::mem::take(&mut *self.statics.lock());
        for (_, subscription) in live.into_iter().chain(statics) {
            subscription.cancel();
        }
    }

    /// Number of live per-key subscriptions.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    /// Number of static stream subscriptions.
    pub fn static_count(&self) -> usize {
        self.statics.lock().len()
    }

    /// True when `key` has a live subscription.
    pub fn is_tracking(&self, key: &str) -> bool {
        self.live.lock().contains_key(key)
    }

    /// Keys with a live subscription, in subscription order.
    pub fn tracked_keys(&self) -> Vec<String> {
        self.live.lock().keys().cloned().collect()
    }

    fn track(&self, key: &str, subscription: Subscription) {
        self.log.debug(format_args!("saving subscription [{key}]"));
        let displaced = self.live.lock().insert(key.to_string(), subscription);
        if let Some(displaced) = displaced {
            self.log
                .warning(format_args!("replacing a live subscription for [{key}]"));
            displaced.cancel();
        }
    }

    fn connect(
        &self,
        record: &PropertyRecord,
        state: &StateAggregator,
        instance: Option<&dyn Component>,
    ) -> Option<Subscription> {
        let key = record.key();
        match record.classification() {
            Classification::Stream => {
                let stream = record.stream()?;
                self.log.info(format_args!("subscribing to stream [{key}]"));
                Some(bind_stream(key, stream, state))
            }
            Classification::Sink => {
                let sink = record.sink()?;
                self.connect_sink(key, sink, instance)
            }
            Classification::Plain => None,
        }
    }

    fn connect_sink(
        &self,
        key: &str,
        sink: &Observer,
        instance: Option<&dyn Component>,
    ) -> Option<Subscription> {
        let member = instance.and_then(|component| component.member(key));
        let Some(member) = member else {
            self.log.warning(format_args!(
                "Received a subscribable property, but nothing to subscribe to. Prop: [{key}]"
            ));
            return None;
        };

        self.log.debug(format_args!("found [{key}] on component instance"));
        match resolve(&member) {
            Resolved::Stream(stream) => {
                self.log.info(format_args!("sending subscriber for [{key}]"));
                Some(stream.subscribe(sink.clone()))
            }
            _ => {
                self.log.warning(format_args!(
                    "Received a subscribable property, but [{key}] on the component is not a stream"
                ));
                None
            }
        }
    }
}

impl std::fmt::Debug for SubscriptionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionLedger")
            .field("live", &self.tracked_keys())
            .field("static_count", &self.static_count())
            .finish()
    }
}

/// Subscribe an observer that forwards deliveries for `key` into `state`.
///
/// The returned subscription closes a gate before cancelling the inner one,
/// so a stream that keeps calling a cancelled observer is ignored.
fn bind_stream(key: &str, stream: &StreamRef, state: &StateAggregator) -> Subscription {
    let open = Arc::new(AtomicBool::new(true));

    let next_open = open.clone();
    let next_state = state.clone();
    let next_key = key.to_string();
    let error_open = open.clone();
    let error_state = state.clone();
    let error_key = key.to_string();
    let observer = Observer::new()
        .on_next(move |value| {
            if next_open.load(Ordering::SeqCst) {
                next_state.deliver(&next_key, value);
            }
        })
        .on_error(move |error| {
            if error_open.load(Ordering::SeqCst) {
                error_state.report_error(&error_key, &error);
            }
        });

    let gate = Subscription::new(move || open.store(false, Ordering::SeqCst));
    gate.add(stream.subscribe(observer));
    gate
}

fn is_stream(set: &PropertySet, key: &str) -> bool {
    set.get(key)
        .map(|r| r.classification() == Classification::Stream)
        .unwrap_or(false)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::lifecycle::Members;
    use crate::adapter::scheduler::TurnQueue;
    use crate::adapter::state::{RenderState, StateListener};
    use crate::error::StreamError;
    use crate::logger::{LogLevel, Logger, MemorySink};
    use crate::props::{diff, Pass, PropValue, Props};
    use crate::stream::Subject;
    use serde_json::Value;

    struct Quiet;

    impl StateListener for Quiet {
        fn state_changed(&self, _state: &RenderState) {}
        fn stream_failed(&self, _key: &str, _error: &StreamError) {}
    }

    struct Fixture {
        queue: Arc<TurnQueue>,
        sink: Arc<MemorySink>,
        state: StateAggregator,
        ledger: SubscriptionLedger,
    }

    fn fixture() -> Fixture {
        let queue = TurnQueue::new();
        let sink = MemorySink::new();
        let log = ScopedLogger::new(Arc::new(Logger::new(LogLevel::Warning, sink.clone())), None);
        let state = StateAggregator::new(
            RenderState::default(),
            queue.clone(),
            Arc::new(Quiet),
            log.clone(),
        );
        state.set_accepting(true);
        Fixture {
            queue,
            sink,
            state,
            ledger: SubscriptionLedger::new(log),
        }
    }

    impl Fixture {
        fn pass(
            &self,
            prev: &PropertySet,
            curr: &PropertySet,
            instance: Option<&dyn Component>,
        ) -> Vec<String> {
            let delta = diff(prev, curr, Pass::StreamLike);
            self.ledger.reconcile(&delta, prev, curr, &self.state, instance)
        }
    }

    #[test]
    fn added_stream_is_subscribed_and_delivers() {
        let f = fixture();
        let subject = Subject::new();
        let curr = PropertySet::from_props(&Props::new().with("s", subject.clone()));

        f.pass(&PropertySet::new(), &curr, None);
        subject.next(5);
        f.queue.run_turn();

        assert!(f.ledger.is_tracking("s"));
        assert_eq!(subject.observer_count(), 1);
        assert_eq!(f.state.published().stream_values().get("s"), Some(&Value::from(5)));
    }

    #[test]
    fn changed_stream_cancels_before_resubscribing() {
        let f = fixture();
        let first = Subject::new();
        let second = Subject::new();
        let prev = PropertySet::from_props(&Props::new().with("s", first.clone()));
        let curr = PropertySet::from_props(&Props::new().with("s", second.clone()));

        f.pass(&PropertySet::new(), &prev, None);
        f.pass(&prev, &curr, None);

        assert_eq!(first.observer_count(), 0);
        assert_eq!(second.observer_count(), 1);
        assert_eq!(f.ledger.live_count(), 1);
    }

    #[test]
    fn stream_becoming_sink_drops_value_and_connects_sink() {
        let f = fixture();
        let source = Subject::with_value(1);
        let exposed = Subject::new();
        let component = Members::new().with("s", exposed.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let prev = PropertySet::from_props(&Props::new().with("s", source.clone()));
        let curr = PropertySet::from_props(
            &Props::new().with("s", PropValue::function(move |v| seen_clone.lock().push(v))),
        );

        f.pass(&PropertySet::new(), &prev, Some(&component as &dyn Component));
        f.queue.run_turn();
        assert_eq!(f.state.published().stream_values().get("s"), Some(&Value::from(1)));

        let delta = diff(&prev, &curr, Pass::StreamLike);
        assert_eq!(delta.changed.as_slice(), ["s".to_string()]);
        let unconnected = f.pass(&prev, &curr, Some(&component as &dyn Component));
        f.queue.run_turn();
        exposed.next("after");

        assert!(unconnected.is_empty());
        assert_eq!(source.observer_count(), 0);
        assert_eq!(exposed.observer_count(), 1);
        assert_eq!(f.ledger.live_count(), 1);
        assert!(f.state.published().stream_values().is_empty());
        assert_eq!(*seen.lock(), vec![Value::from("after")]);
        assert!(f.sink.lines().is_empty());
    }

    #[test]
    fn removed_stream_is_cancelled_and_value_dropped() {
        let f = fixture();
        let subject = Subject::with_value(1);
        let prev = PropertySet::from_props(&Props::new().with("s", subject.clone()));

        f.pass(&PropertySet::new(), &prev, None);
        f.queue.run_turn();
        f.pass(&prev, &PropertySet::new(), None);
        f.queue.run_turn();

        assert_eq!(f.ledger.live_count(), 0);
        assert_eq!(subject.observer_count(), 0);
        assert!(f.state.published().stream_values().is_empty());
    }

    #[test]
    fn sink_attaches_to_component_stream() {
        let f = fixture();
        let exposed = Subject::new();
        let component = Members::new().with("clicks", exposed.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let curr = PropertySet::from_props(
            &Props::new().with("clicks", PropValue::function(move |v| seen_clone.lock().push(v))),
        );

        let unconnected = f.pass(&PropertySet::new(), &curr, Some(&component as &dyn Component));
        exposed.next("click");

        assert!(unconnected.is_empty());
        assert!(f.ledger.is_tracking("clicks"));
        assert_eq!(*seen.lock(), vec![Value::from("click")]);
    }

    #[test]
    fn sink_without_counterpart_is_left_unconnected() {
        let f = fixture();
        let curr = PropertySet::from_props(&Props::new().with("c", PropValue::function(|_| {})));

        let empty = Members::new();
        let unconnected = f.pass(&PropertySet::new(), &curr, Some(&empty as &dyn Component));

        assert_eq!(unconnected, vec!["c".to_string()]);
        assert_eq!(f.ledger.live_count(), 0);
        assert_eq!(f.sink.messages(LogLevel::Warning).len(), 1);
    }

    #[test]
    fn sink_with_non_stream_member_is_left_unconnected() {
        let f = fixture();
        let component = Members::new().with("c", 3);
        let curr = PropertySet::from_props(&Props::new().with("c", PropValue::function(|_| {})));

        let unconnected = f.pass(&PropertySet::new(), &curr, Some(&component as &dyn Component));

        assert_eq!(unconnected, vec!["c".to_string()]);
        assert!(f.sink.messages(LogLevel::Warning)[0].contains("not a stream"));
    }

    #[test]
    fn redundant_cancel_warns() {
        let f = fixture();
        assert!(!f.ledger.cancel("nothing"));
        assert_eq!(
            f.sink.messages(LogLevel::Warning),
            vec!["no subscription found for [nothing]".to_string()]
        );
    }

    #[test]
    fn cancel_all_clears_statics_and_live() {
        let f = fixture();
        let live = Subject::new();
        let fixed = Subject::new();
        let curr = PropertySet::from_props(&Props::new().with("s", live.clone()));
        f.pass(&PropertySet::new(), &curr, None);
        f.ledger.subscribe_static("fixed", &fixed.to_stream(), &f.state);

        f.ledger.cancel_all();

        assert_eq!(f.ledger.live_count(), 0);
        assert_eq!(f.ledger.static_count(), 0);
        assert_eq!(live.observer_count(), 0);
        assert_eq!(fixed.observer_count(), 0);
    }

    #[test]
    fn stream_error_is_forwarded_not_resubscribed() {
        let f = fixture();
        let subject = Subject::new();
        let curr = PropertySet::from_props(&Props::new().with("s", subject.clone()));
        f.pass(&PropertySet::new(), &curr, None);

        subject.error("gone");

        assert_eq!(f.sink.messages(LogLevel::Error), vec!["stream [s] failed: gone".to_string()]);
        assert_eq!(subject.observer_count(), 0);
    }
}
