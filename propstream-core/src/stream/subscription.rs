//! Cancelable subscription handles.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Generate a new unique subscription ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

type Teardown = Box<dyn FnOnce() + Send>;

struct Inner {
    id: SubscriptionId,
    closed: AtomicBool,
    teardown: Mutex<Option<Teardown>>,
    children: Mutex<Vec<Subscription>>,
}

/// Handle to an active subscription.
///
/// Clones share the same underlying subscription. Cancelling is idempotent:
/// the teardown runs exactly once no matter how many times, or through how
/// many clones, [`cancel`](Subscription::cancel) is called.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<Inner>,
}

impl Subscription {
    /// Create a subscription that runs `teardown` when cancelled.
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::build(Some(Box::new(teardown)))
    }

    /// A subscription with nothing to tear down.
    ///
    /// Useful as a parent for [`add`](Subscription::add).
    pub fn empty() -> Self {
        Self::build(None)
    }

    fn build(teardown: Option<Teardown>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: SubscriptionId::new(),
                closed: AtomicBool::new(false),
                teardown: Mutex::new(teardown),
                children: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Get the subscription's unique ID.
    pub fn id(&self) -> SubscriptionId {
        self.inner.id
    }

    /// True once cancelled.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Attach a child that is cancelled together with this subscription.
    ///
    /// If this subscription is already closed the child is cancelled
    /// immediately.
    pub fn add(&self, child: Subscription) {
        if self.is_closed() {
            child.cancel();
            return;
        }
        self.inner.children.lock().push(child);
        // cancel() may have raced in between the check and the push
        if self.is_closed() {
            self.cancel_children();
        }
    }

    /// Cancel the subscription and all of its children.
    pub fn cancel(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let teardown = self.inner.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown();
        }
        self.cancel_children();
    }

    fn cancel_children(&self) {
        let children = std::mem::take(&mut *self.inner.children.lock());
        for child in children {
            child.cancel();
        }
    }

    /// True when both handles are clones of one subscription.
    pub fn same(&self, other: &Subscription) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
