//! Subject Implementation
//!
//! A Subject is a multicast stream: values pushed into it are delivered to
//! every observer subscribed at that moment. It can optionally hold the
//! latest value and replay it to new subscribers.
//!
//! # Terminal Signals
//!
//! After `error` or `complete` the subject is stopped. Further pushes are
//! ignored and late subscribers receive the terminal signal immediately.
//!
//! # Locking
//!
//! Observers are invoked after the observer list lock is released, so an
//! observer may unsubscribe or push from inside its own callback.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::{Observer, Stream, Subscription, SubscriptionId};
use crate::error::StreamError;

#[derive(Debug, Clone)]
enum Terminal {
    Errored(StreamError),
    Completed,
}

struct State {
    latest: Option<Value>,
    replay: bool,
    terminal: Option<Terminal>,
    observers: Vec<(SubscriptionId, Observer)>,
}

/// A multicast stream that values can be pushed into.
#[derive(Clone)]
pub struct Subject {
    state: Arc<Mutex<State>>,
}

impl Subject {
    /// A subject that delivers only values pushed after subscription.
    pub fn new() -> Self {
        Self::build(None, false)
    }

    /// A subject that replays its latest value, starting with `initial`.
    pub fn with_value(initial: impl Into<Value>) -> Self {
        Self::build(Some(initial.into()), true)
    }

    /// A subject that replays its latest value once one has been pushed.
    pub fn replaying() -> Self {
        Self::build(None, true)
    }

    fn build(latest: Option<Value>, replay: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                latest,
                replay,
                terminal: None,
                observers: Vec::new(),
            })),
        }
    }

    /// Push a value to every current observer.
    pub fn next(&self, value: impl Into<Value>) {
        let value = value.into();
        let observers = {
            let mut state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }
            if state.replay {
                state.latest = Some(value.clone());
            }
            Self::snapshot(&state)
        };
        for observer in observers {
            observer.next(value.clone());
        }
    }

    /// Signal a terminal error.
    pub fn error(&self, error: impl Into<StreamError>) {
        let error = error.into();
        let observers = match self.stop(Terminal::Errored(error.clone())) {
            Some(observers) => observers,
            None => return,
        };
        for observer in observers {
            observer.error(error.clone());
        }
    }

    /// Signal completion.
    pub fn complete(&self) {
        let observers = match self.stop(Terminal::Completed) {
            Some(observers) => observers,
            None => return,
        };
        for observer in observers {
            observer.complete();
        }
    }

    /// The latest value, if this subject replays.
    pub fn value(&self) -> Option<Value> {
        self.state.lock().latest.clone()
    }

    /// Number of observers currently subscribed.
    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    /// True after `error` or `complete`.
    pub fn is_stopped(&self) -> bool {
        self.state.lock().terminal.is_some()
    }

    /// Wrap this subject as a shareable stream handle.
    pub fn to_stream(&self) -> Arc<dyn Stream> {
        Arc::new(self.clone())
    }

    fn stop(&self, terminal: Terminal) -> Option<Vec<Observer>> {
        let mut state = self.state.lock();
        if state.terminal.is_some() {
            return None;
        }
        state.terminal = Some(terminal);
        let observers = std::mem::take(&mut state.observers);
        Some(observers.into_iter().map(|(_, o)| o).collect())
    }

    fn snapshot(state: &State) -> Vec<Observer> {
        state.observers.iter().map(|(_, o)| o.clone()).collect()
    }
}

impl Default for Subject {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for Subject {
    fn subscribe(&self, observer: Observer) -> Subscription {
        let id = SubscriptionId::new();
        let (replay, terminal) = {
            let mut state = self.state.lock();
            match &state.terminal {
                Some(terminal) => (None, Some(terminal.clone())),
                None => {
                    state.observers.push((id, observer.clone()));
                    let replay = if state.replay { state.latest.clone() } else { None };
                    (replay, None)
                }
            }
        };

        match terminal {
            Some(Terminal::Errored(error)) => {
                observer.error(error);
                return Subscription::empty();
            }
            Some(Terminal::Completed) => {
                observer.complete();
                return Subscription::empty();
            }
            None => {}
        }

        if let Some(value) = replay {
            observer.next(value);
        }

        let state = Arc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.lock().observers.retain(|(sid, _)| *sid != id);
            }
        })
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.state) as usize
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Subject")
            .field("latest", &state.latest)
            .field("observer_count", &state.observers.len())
            .field("stopped", &state.terminal.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Observer, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        (Observer::from_fn(move |v| seen_clone.lock().push(v)), seen)
    }

    #[test]
    fn subject_multicasts() {
        let subject = Subject::new();
        let (a, seen_a) = recorder();
        let (b, seen_b) = recorder();
        let _sa = subject.subscribe(a);
        let _sb = subject.subscribe(b);

        subject.next(1);
        subject.next(2);

        assert_eq!(*seen_a.lock(), vec![Value::from(1), Value::from(2)]);
        assert_eq!(*seen_b.lock(), vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn with_value_replays_latest() {
        let subject = Subject::with_value(5);
        subject.next(6);

        let (observer, seen) = recorder();
        let _sub = subject.subscribe(observer);

        assert_eq!(*seen.lock(), vec![Value::from(6)]);
        assert_eq!(subject.value(), Some(Value::from(6)));
    }

    #[test]
    fn plain_subject_does_not_replay() {
        let subject = Subject::new();
        subject.next(1);

        let (observer, seen) = recorder();
        let _sub = subject.subscribe(observer);

        assert!(seen.lock().is_empty());
    }

    #[test]
    fn cancel_removes_observer() {
        let subject = Subject::new();
        let (observer, seen) = recorder();
        let sub = subject.subscribe(observer);
        assert_eq!(subject.observer_count(), 1);

        sub.cancel();
        subject.next(1);

        assert_eq!(subject.observer_count(), 0);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn error_stops_subject() {
        let subject = Subject::new();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = errors.clone();
        let _sub = subject.subscribe(
            Observer::new().on_error(move |e| errors_clone.lock().push(e)),
        );

        subject.error("boom");
        subject.next(1);

        assert!(subject.is_stopped());
        assert_eq!(subject.observer_count(), 0);
        assert_eq!(*errors.lock(), vec![StreamError::new("boom")]);
    }

    #[test]
    fn late_subscriber_sees_completion() {
        let subject = Subject::new();
        subject.complete();

        let done = Arc::new(Mutex::new(false));
        let done_clone = done.clone();
        let sub = subject.subscribe(Observer::new().on_complete(move || {
            *done_clone.lock() = true;
        }));

        assert!(*done.lock());
        assert_eq!(subject.observer_count(), 0);
        sub.cancel();
    }

    #[test]
    fn clones_share_identity() {
        let subject = Subject::new();
        assert!(crate::stream::same_stream(&subject.to_stream(), &subject.clone().to_stream()));
        assert!(!crate::stream::same_stream(&subject.to_stream(), &Subject::new().to_stream()));
    }

    #[test]
    fn observer_may_unsubscribe_during_delivery() {
        let subject = Subject::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();
        let sub = subject.subscribe(Observer::from_fn(move |_| {
            if let Some(sub) = slot_clone.lock().take() {
                sub.cancel();
            }
        }));
        *slot.lock() = Some(sub);

        subject.next(1);

        assert_eq!(subject.observer_count(), 0);
    }
}
