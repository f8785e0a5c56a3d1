//! Single-shot deferred tasks that cover gaps in the host's notifications.
//!
//! Two trigger kinds exist:
//!
//! - **idle**: runs on the next host idle notification, on the host thread,
//!   then is forgotten;
//! - **delay**: runs once after a fixed duration on the tokio runtime.
//!
//! There is at most one pending task per [`TaskPurpose`]. Scheduling a new one
//! supersedes the old: a pending idle action is dropped, a pending timer is
//! aborted. Each action also receives its [`TaskTicket`] and is expected to
//! call [`DeferredRefreshScheduler::is_current`] before acting, so a task that
//! slipped past supersession turns into a no-op.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// What a deferred task is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskPurpose {
    /// Re-read the active document after the host swapped its handle.
    ResyncAfterFirstSave,
    /// Decide whether the last document was closed.
    ClosingCheck,
}

/// Identity of one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskTicket {
    pub purpose: TaskPurpose,
    pub generation: u64,
}

type Action = Box<dyn FnOnce(TaskTicket) + Send>;

enum Pending {
    Idle { ticket: TaskTicket, action: Action },
    Timer { ticket: TaskTicket, task: JoinHandle<()> },
}

impl Pending {
    fn ticket(&self) -> TaskTicket {
        match self {
            Self::Idle { ticket, .. } | Self::Timer { ticket, .. } => *ticket,
        }
    }

    fn cancel(self) {
        if let Self::Timer { task, .. } = self {
            task.abort();
        }
    }
}

#[derive(Default)]
struct SchedulerState {
    next_generation: u64,
    current: HashMap<TaskPurpose, u64>,
    pending: HashMap<TaskPurpose, Pending>,
    cancelled: bool,
}

impl SchedulerState {
    fn issue(&mut self, purpose: TaskPurpose) -> TaskTicket {
        self.next_generation += 1;
        let ticket = TaskTicket {
            purpose,
            generation: self.next_generation,
        };
        self.current.insert(purpose, ticket.generation);
        if let Some(previous) = self.pending.remove(&purpose) {
            tracing::debug!(
                "{:?} task {} superseded by {}",
                purpose,
                previous.ticket().generation,
                ticket.generation
            );
            previous.cancel();
        }
        ticket
    }
}

/// Runs at most one pending task per purpose.
pub struct DeferredRefreshScheduler {
    runtime: Handle,
    state: Arc<Mutex<SchedulerState>>,
}

impl DeferredRefreshScheduler {
    /// Creates a scheduler whose timers run on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    /// Schedules `action` for the next [`fire_idle`](Self::fire_idle).
    pub fn schedule_on_idle<F>(&self, purpose: TaskPurpose, action: F) -> TaskTicket
    where
        F: FnOnce(TaskTicket) + Send + 'static,
    {
        let mut state = lock(&self.state);
        let ticket = state.issue(purpose);
        if state.cancelled {
            tracing::debug!("scheduler cancelled, dropping idle {:?} task", purpose);
            return ticket;
        }
        state.pending.insert(
            purpose,
            Pending::Idle {
                ticket,
                action: Box::new(action),
            },
        );
        tracing::debug!("scheduled idle {:?} task {}", purpose, ticket.generation);
        ticket
    }

    /// Schedules `action` to run once after `delay`.
    pub fn schedule_after<F>(&self, purpose: TaskPurpose, delay: Duration, action: F) -> TaskTicket
    where
        F: FnOnce(TaskTicket) + Send + 'static,
    {
        let mut state = lock(&self.state);
        let ticket = state.issue(purpose);
        if state.cancelled {
            tracing::debug!("scheduler cancelled, dropping delayed {:?} task", purpose);
            return ticket;
        }

        let shared = Arc::clone(&self.state);
        // The state lock is held until the entry is inserted, so the timer
        // cannot observe its own slot before it exists.
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let due = {
                let mut state = lock(&shared);
                let matches = matches!(
                    state.pending.get(&purpose),
                    Some(Pending::Timer { ticket: pending, .. }) if *pending == ticket
                );
                if matches {
                    state.pending.remove(&purpose);
                }
                matches
            };
            if due {
                action(ticket);
            }
        });
        state.pending.insert(purpose, Pending::Timer { ticket, task });
        tracing::debug!(
            "scheduled {:?} task {} in {:?}",
            purpose,
            ticket.generation,
            delay
        );
        ticket
    }

    /// Runs every idle task pending at the time of the call.
    ///
    /// Actions run outside the scheduler lock; tasks they schedule wait for
    /// the next idle notification. Returns the number of actions run.
    pub fn fire_idle(&self) -> usize {
        let mut due: Vec<(TaskTicket, Action)> = {
            let mut state = lock(&self.state);
            let purposes: Vec<TaskPurpose> = state
                .pending
                .iter()
                .filter(|(_, pending)| matches!(pending, Pending::Idle { .. }))
                .map(|(purpose, _)| *purpose)
                .collect();
            purposes
                .into_iter()
                .filter_map(|purpose| match state.pending.remove(&purpose) {
                    Some(Pending::Idle { ticket, action }) => Some((ticket, action)),
                    _ => None,
                })
                .collect()
        };
        due.sort_by_key(|(ticket, _)| ticket.generation);

        let count = due.len();
        for (ticket, action) in due {
            tracing::debug!("running idle {:?} task {}", ticket.purpose, ticket.generation);
            action(ticket);
        }
        count
    }

    /// Returns true if `ticket` is the latest task of its purpose and the
    /// scheduler has not been cancelled.
    pub fn is_current(&self, ticket: TaskTicket) -> bool {
        let state = lock(&self.state);
        !state.cancelled && state.current.get(&ticket.purpose) == Some(&ticket.generation)
    }

    pub fn has_pending(&self, purpose: TaskPurpose) -> bool {
        lock(&self.state).pending.contains_key(&purpose)
    }

    /// Drops the pending task of `purpose`, if any.
    pub fn cancel(&self, purpose: TaskPurpose) {
        let mut state = lock(&self.state);
        state.current.remove(&purpose);
        if let Some(pending) = state.pending.remove(&purpose) {
            pending.cancel();
        }
    }

    /// Cancels everything and refuses further work. Idempotent.
    pub fn cancel_all(&self) {
        let mut state = lock(&self.state);
        state.cancelled = true;
        state.current.clear();
        for (_, pending) in state.pending.drain() {
            pending.cancel();
        }
    }
}

impl Drop for DeferredRefreshScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

impl std::fmt::Debug for DeferredRefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("DeferredRefreshScheduler")
            .field("pending", &state.pending.keys().collect::<Vec<_>>())
            .field("cancelled", &state.cancelled)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let read = Arc::clone(&count);
        (count, move || read.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_idle_task_runs_once() {
        let scheduler = DeferredRefreshScheduler::new(Handle::current());
        let (count, read) = counter();

        scheduler.schedule_on_idle(TaskPurpose::ResyncAfterFirstSave, move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduler.has_pending(TaskPurpose::ResyncAfterFirstSave));

        assert_eq!(scheduler.fire_idle(), 1);
        assert_eq!(scheduler.fire_idle(), 0);
        assert_eq!(read(), 1);
        assert!(!scheduler.has_pending(TaskPurpose::ResyncAfterFirstSave));
    }

    #[tokio::test]
    async fn test_new_idle_task_supersedes_old() {
        let scheduler = DeferredRefreshScheduler::new(Handle::current());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first_seen = Arc::clone(&seen);
        let first = scheduler.schedule_on_idle(TaskPurpose::ResyncAfterFirstSave, move |t| {
            first_seen.lock().unwrap().push(t.generation);
        });
        let second_seen = Arc::clone(&seen);
        let second = scheduler.schedule_on_idle(TaskPurpose::ResyncAfterFirstSave, move |t| {
            second_seen.lock().unwrap().push(t.generation);
        });

        assert!(!scheduler.is_current(first));
        assert!(scheduler.is_current(second));
        assert_eq!(scheduler.fire_idle(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![second.generation]);
    }

    #[tokio::test]
    async fn test_idle_tasks_scheduled_while_firing_wait() {
        let scheduler = Arc::new(DeferredRefreshScheduler::new(Handle::current()));
        let (count, read) = counter();

        let inner = Arc::clone(&scheduler);
        scheduler.schedule_on_idle(TaskPurpose::ResyncAfterFirstSave, move |_| {
            inner.schedule_on_idle(TaskPurpose::ResyncAfterFirstSave, move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert_eq!(scheduler.fire_idle(), 1);
        assert_eq!(read(), 0);
        assert_eq!(scheduler.fire_idle(), 1);
        assert_eq!(read(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_task_fires_after_delay() {
        let scheduler = DeferredRefreshScheduler::new(Handle::current());
        let (count, read) = counter();

        scheduler.schedule_after(
            TaskPurpose::ClosingCheck,
            Duration::from_millis(200),
            move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(read(), 0);
        assert!(scheduler.has_pending(TaskPurpose::ClosingCheck));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(read(), 1);
        assert!(!scheduler.has_pending(TaskPurpose::ClosingCheck));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_task_superseded() {
        let scheduler = DeferredRefreshScheduler::new(Handle::current());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..3 {
            let seen = Arc::clone(&seen);
            scheduler.schedule_after(
                TaskPurpose::ClosingCheck,
                Duration::from_millis(200),
                move |ticket| seen.lock().unwrap().push(ticket.generation),
            );
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_stops_timers_and_refuses_work() {
        let scheduler = DeferredRefreshScheduler::new(Handle::current());
        let (count, read) = counter();

        let timer_count = Arc::clone(&count);
        scheduler.schedule_after(
            TaskPurpose::ClosingCheck,
            Duration::from_millis(50),
            move |_| {
                timer_count.fetch_add(1, Ordering::SeqCst);
            },
        );
        scheduler.cancel_all();
        scheduler.cancel_all();

        let ticket = scheduler.schedule_on_idle(TaskPurpose::ResyncAfterFirstSave, move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!scheduler.is_current(ticket));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(scheduler.fire_idle(), 0);
        assert_eq!(read(), 0);
    }

    #[tokio::test]
    async fn test_purposes_are_independent() {
        let scheduler = DeferredRefreshScheduler::new(Handle::current());
        let resync = scheduler.schedule_on_idle(TaskPurpose::ResyncAfterFirstSave, |_| {});
        let closing =
            scheduler.schedule_after(TaskPurpose::ClosingCheck, Duration::from_secs(60), |_| {});
        assert!(scheduler.is_current(resync));
        assert!(scheduler.is_current(closing));

        scheduler.cancel(TaskPurpose::ClosingCheck);
        assert!(!scheduler.is_current(closing));
        assert!(scheduler.is_current(resync));
        assert!(!scheduler.has_pending(TaskPurpose::ClosingCheck));
    }
}
