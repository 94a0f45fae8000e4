//! Deferred-task scheduling for the debounced persister.
//!
//! The persister only needs "run this later, unless I cancel it first".
//! [`TokioScheduler`] does that on a tokio runtime; [`ManualScheduler`] does it
//! on a virtual clock that only moves when told to.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;

use crate::error::{Error, Result};

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Schedules tasks to run after a delay.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Run `task` once `delay` has elapsed, unless the returned handle is
    /// cancelled first.
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;
}

/// Cancels a scheduled task. Dropping the handle leaves the task scheduled.
pub struct TimerHandle {
    cancel: Box<dyn FnOnce() + Send + 'static>,
}

impl TimerHandle {
    /// Wrap a cancellation callback.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    /// Prevent the task from running if it has not started yet.
    pub fn cancel(self) {
        (self.cancel)();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle").finish_non_exhaustive()
    }
}

/// Runs tasks on a tokio runtime via `tokio::time::sleep`.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Schedule onto the given runtime.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Schedule onto the runtime the caller is running in.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a tokio runtime.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::internal(format!("no tokio runtime: {e}")))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        TimerHandle::new(move || join.abort())
    }
}

/// A scheduler driven by an explicit virtual clock.
///
/// Nothing runs until [`advance`](Self::advance) moves the clock past a
/// task's due time. Clones share the same clock.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualClock>>,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_id: u64,
    tasks: Vec<ManualTask>,
}

struct ManualTask {
    id: u64,
    due: Duration,
    task: Task,
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("now", &self.now)
            .field("pending", &self.tasks.len())
            .finish()
    }
}

impl ManualScheduler {
    /// Create a scheduler at virtual time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn clock(&self) -> MutexGuard<'_, ManualClock> {
        lock_clock(&self.inner)
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock().now
    }

    /// Number of tasks scheduled and not yet run or cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.clock().tasks.len()
    }

    /// Move the clock forward by `by`, running every task that falls due in
    /// due-time order. Tasks may schedule further tasks; those run too if
    /// they fall due within the window.
    pub fn advance(&self, by: Duration) {
        let target = self.clock().now + by;
        loop {
            let next = {
                let mut clock = self.clock();
                let due_index = clock
                    .tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.id))
                    .map(|(i, _)| i);
                match due_index {
                    Some(i) => {
                        let task = clock.tasks.remove(i);
                        clock.now = task.due;
                        Some(task.task)
                    }
                    None => {
                        clock.now = target;
                        None
                    }
                }
            };
            // Run outside the lock so the task can schedule or cancel
            match next {
                Some(task) => task(),
                None => break,
            }
        }
    }
}

fn lock_clock(clock: &Mutex<ManualClock>) -> MutexGuard<'_, ManualClock> {
    clock.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let id = {
            let mut clock = self.clock();
            let id = clock.next_id;
            clock.next_id += 1;
            let due = clock.now + delay;
            clock.tasks.push(ManualTask { id, due, task });
            id
        };

        let weak: Weak<Mutex<ManualClock>> = Arc::downgrade(&self.inner);
        TimerHandle::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock_clock(&inner).tasks.retain(|t| t.id != id);
            }
        })
    }
}
