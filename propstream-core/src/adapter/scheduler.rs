//! Deferred Task Scheduling
//!
//! State publication is coalesced by deferring the flush to the end of the
//! current turn of the host's event loop. The [`Scheduler`] trait is the
//! seam between the adapter and whatever loop the host runs.
//!
//! - [`TurnQueue`]: the host drives turns explicitly with
//!   [`TurnQueue::run_turn`].
//! - [`TokioScheduler`]: deferred tasks are spawned onto a current-thread
//!   tokio runtime and run once the current task yields. Multi-thread
//!   runtimes are refused: a worker could run the flush in the middle of
//!   a turn.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::error::SchedulerError;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send>;

/// Runs tasks after the current turn completes.
pub trait Scheduler: Send + Sync {
    /// Queue `task` to run after the current turn. Never runs it inline.
    fn defer(&self, task: Task);
}

/// A FIFO of deferred tasks, drained by the host.
#[derive(Default)]
pub struct TurnQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl TurnQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Run deferred tasks until the queue is empty.
    ///
    /// Tasks queued while draining run in the same call. Returns how many
    /// tasks ran.
    pub fn run_turn(&self) -> usize {
        let mut ran = 0;
        // The lock is released before each task runs so tasks can defer more work
        while let Some(task) = self.pop() {
            task();
            ran += 1;
        }
        ran
    }

    /// Number of tasks waiting for the next turn.
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    fn pop(&self) -> Option<Task> {
        self.tasks.lock().pop_front()
    }
}

impl Scheduler for TurnQueue {
    fn defer(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }
}

impl std::fmt::Debug for TurnQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Defers tasks by spawning them onto a current-thread tokio runtime.
///
/// On a current-thread runtime a spawned task cannot start until the task
/// that spawned it yields, which is what makes a turn a turn.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Wrap `handle`, refusing anything but a current-thread runtime.
    pub fn new(handle: Handle) -> Result<Self, SchedulerError> {
        match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => Ok(Self { handle }),
            flavor => Err(SchedulerError::UnsupportedRuntime(format!("{flavor:?}"))),
        }
    }

    /// Use the runtime the caller is running on.
    pub fn try_current() -> Result<Self, SchedulerError> {
        let handle = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        Self::new(handle)
    }
}

impl Scheduler for TokioScheduler {
    fn defer(&self, task: Task) {
        self.handle.spawn(async move { task() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn defer_does_not_run_inline() {
        let queue = TurnQueue::new();
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();

        queue.defer(Box::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(queue.pending(), 1);

        assert_eq!(queue.run_turn(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn tasks_run_in_order_including_nested() {
        let queue = TurnQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let inner_queue = queue.clone();
        let o1 = order.clone();
        queue.defer(Box::new(move || {
            o1.lock().push(1);
            let o3 = o1.clone();
            inner_queue.defer(Box::new(move || o3.lock().push(3)));
        }));
        let o2 = order.clone();
        queue.defer(Box::new(move || o2.lock().push(2)));

        assert_eq!(queue.run_turn(), 3);
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn tokio_scheduler_runs_after_yield() {
        let scheduler = TokioScheduler::try_current().expect("inside a runtime");
        let (tx, rx) = tokio::sync::oneshot::channel();

        scheduler.defer(Box::new(move || {
            let _ = tx.send(7);
        }));

        assert_eq!(rx.await.unwrap(), 7);
    }

    #[test]
    fn no_tokio_runtime_outside_async_context() {
        assert_eq!(
            TokioScheduler::try_current().unwrap_err(),
            SchedulerError::NoRuntime
        );
    }

    #[test]
    fn multi_thread_runtime_is_refused() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .build()
            .unwrap();

        let err = TokioScheduler::new(runtime.handle().clone()).unwrap_err();
        assert!(matches!(err, SchedulerError::UnsupportedRuntime(_)));

        let inside = runtime.block_on(async { TokioScheduler::try_current().map(|_| ()) });
        assert!(inside.is_err());
    }

    #[test]
    fn current_thread_runtime_is_accepted() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        assert!(TokioScheduler::new(runtime.handle().clone()).is_ok());
    }
}
