//! Stream Primitives
//!
//! The adapter's stream vocabulary is deliberately small: a stream can be
//! subscribed to with an [`Observer`], and the resulting [`Subscription`]
//! can be cancelled. Any push-based source that satisfies [`Stream`] can be
//! bound to a component property.
//!
//! [`Subject`] is the in-crate implementation, used for static streams,
//! tests and hosts that just need something to push values into.

mod observer;
mod subject;
mod subscription;

pub use observer::Observer;
pub use subject::Subject;
pub use subscription::{Subscription, SubscriptionId};

use std::sync::Arc;

/// A push-based producer of values.
pub trait Stream: Send + Sync {
    /// Start delivering to `observer` until the returned handle is cancelled.
    fn subscribe(&self, observer: Observer) -> Subscription;

    /// Address identifying the underlying producer.
    ///
    /// Handles that share one producer must return the same address.
    fn identity(&self) -> usize {
        (self as *const Self).cast::<()>() as usize
    }
}

/// Shared handle to a stream.
pub type StreamRef = Arc<dyn Stream>;

/// True when both handles resolve to the same producer.
pub fn same_stream(a: &StreamRef, b: &StreamRef) -> bool {
    a.identity() == b.identity()
}
