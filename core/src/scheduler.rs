//! Deferred execution for the watchdog.
//!
//! [`Scheduler`] has no cancel operation: hosts often cannot cancel timers,
//! so every scheduled check re-validates its own preconditions instead.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    /// Run `task` once, no earlier than `delay` from now.
    fn after(&self, delay: Duration, task: Task);
}

/// Timers on a tokio runtime.
///
/// The task itself runs on the blocking pool because gate operations take a
/// `std` mutex and write the state file synchronously.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler for the runtime the caller is running in, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn after(&self, delay: Duration, task: Task) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = tokio::task::spawn_blocking(task).await {
                tracing::error!("Scheduled task failed: {e}");
            }
        });
    }
}

struct Pending {
    due: Duration,
    seq: u64,
    task: Task,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    pending: Vec<Pending>,
}

/// Virtual clock that only moves when told to.
///
/// Tasks due at the same instant run in scheduling order. Tasks may schedule
/// further tasks; those run within the same [`ManualScheduler::advance`] call
/// if they fall inside the advanced window.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time elapsed since creation on the virtual clock.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Move the clock forward and run every task that became due.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.lock().now + by;
        let mut ran = 0;

        loop {
            // Never hold the lock while a task runs: tasks may call `after`.
            let next = {
                let mut state = self.lock();
                let due_index = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(i, _)| i);
                match due_index {
                    Some(index) => {
                        let pending = state.pending.swap_remove(index);
                        state.now = state.now.max(pending.due);
                        Some(pending.task)
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };

            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn after(&self, delay: Duration, task: Task) {
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let due = state.now + delay;
        state.pending.push(Pending { due, seq, task });
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("pending", &state.pending.len())
            .finish()
    }
}
