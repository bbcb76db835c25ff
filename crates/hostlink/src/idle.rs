//! Single-shot task queue driven by the host idle signal
//!
//! Document mutations that do not originate from a user command are only
//! legal while the host is idle. Tasks queued here run exactly once, on the
//! next `Idling` event, on the host thread.
//!
//! The queue keeps an explicit registration flag: it subscribes to the idle
//! signal when the first task arrives and unsubscribes before running the
//! batch, so the host never holds two subscriptions for the same queue.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::host::HostApplication;

/// A deferred unit of work
pub type IdleTask = Box<dyn FnOnce() + Send>;

struct IdleState {
    tasks: VecDeque<IdleTask>,
    registered: bool,
}

/// Queue of tasks waiting for the host to become idle
pub struct IdleQueue {
    host: Arc<dyn HostApplication>,
    state: Mutex<IdleState>,
}

impl IdleQueue {
    pub fn new(host: Arc<dyn HostApplication>) -> Self {
        Self {
            host,
            state: Mutex::new(IdleState {
                tasks: VecDeque::new(),
                registered: false,
            }),
        }
    }

    /// Queue a task for the next idle signal
    pub fn enqueue(&self, task: impl FnOnce() + Send + 'static) {
        let subscribe = {
            let mut state = self.state.lock();
            state.tasks.push_back(Box::new(task));
            !std::mem::replace(&mut state.registered, true)
        };
        if subscribe {
            log::debug!("Subscribing to host idle signal");
            self.host.subscribe_idle();
        }
    }

    /// Handle one `Idling` event
    ///
    /// Unsubscribes, then runs every task queued so far. Tasks queued while
    /// the batch runs wait for the next idle signal. A panicking task is
    /// logged and does not stop the rest of the batch. Returns the number of
    /// tasks run.
    pub fn on_idle(&self) -> usize {
        let tasks = {
            let mut state = self.state.lock();
            if !state.registered {
                return 0;
            }
            state.registered = false;
            std::mem::take(&mut state.tasks)
        };

        self.host.unsubscribe_idle();

        let count = tasks.len();
        for (index, task) in tasks.into_iter().enumerate() {
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                log::error!("Idle task {} of {} panicked", index + 1, count);
            }
        }
        count
    }

    /// Number of tasks waiting
    pub fn pending(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Whether the queue currently holds an idle subscription
    pub fn is_registered(&self) -> bool {
        self.state.lock().registered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHost;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_tasks_run_once() {
        let host = Arc::new(MemoryHost::new());
        let queue = IdleQueue::new(host.clone());
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        queue.enqueue(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(queue.on_idle(), 1);
        assert_eq!(queue.on_idle(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_single_subscription() {
        let host = Arc::new(MemoryHost::new());
        let queue = IdleQueue::new(host.clone());

        queue.enqueue(|| {});
        queue.enqueue(|| {});
        assert_eq!(host.idle_subscribe_calls(), 1);
        assert!(host.idle_subscribed());
        assert_eq!(queue.pending(), 2);

        assert_eq!(queue.on_idle(), 2);
        assert!(!host.idle_subscribed());
        assert!(!queue.is_registered());
    }

    #[test]
    fn test_unsubscribes_before_running() {
        let host = Arc::new(MemoryHost::new());
        let queue = IdleQueue::new(host.clone());
        let subscribed_during_task = Arc::new(Mutex::new(None));

        let probe_host = host.clone();
        let probe = subscribed_during_task.clone();
        queue.enqueue(move || {
            *probe.lock() = Some(probe_host.idle_subscribed());
        });
        queue.on_idle();

        assert_eq!(*subscribed_during_task.lock(), Some(false));
    }

    #[test]
    fn test_task_enqueued_during_run_waits() {
        let host = Arc::new(MemoryHost::new());
        let queue = Arc::new(IdleQueue::new(host.clone()));
        let runs = Arc::new(AtomicUsize::new(0));

        let inner_queue = queue.clone();
        let counter = runs.clone();
        queue.enqueue(move || {
            let counter = counter.clone();
            inner_queue.enqueue(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert_eq!(queue.on_idle(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(host.idle_subscribed());

        assert_eq!(queue.on_idle(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(host.idle_subscribe_calls(), 2);
    }

    #[test]
    fn test_panicking_task_does_not_drop_the_batch() {
        let host = Arc::new(MemoryHost::new());
        let queue = IdleQueue::new(host.clone());
        let runs = Arc::new(AtomicUsize::new(0));

        queue.enqueue(|| panic!("host API threw"));
        let counter = runs.clone();
        queue.enqueue(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(queue.on_idle(), 2);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!host.idle_subscribed());
    }
}
