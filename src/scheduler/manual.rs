//! Deterministic scheduler driven by explicit tick advances

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{OnceTask, PeriodicTask, Scheduler, TaskHandle, Ticks};
use crate::util::time::{TICKS_PER_SECOND, TICK_MILLIS};

enum Job {
    Once(OnceTask),
    Periodic { period: Ticks, task: PeriodicTask },
}

struct Entry {
    handle: TaskHandle,
    job: Job,
}

#[derive(Default)]
struct Queue {
    now: Ticks,
    entries: BTreeMap<(Ticks, u64), Entry>,
}

/// Tasks run only inside [`ManualScheduler::advance`], on the caller's
/// thread, in due order. The queue lock is released while a task runs so
/// tasks may schedule or cancel other tasks.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<Queue>,
    next_id: AtomicU64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ticks(&self) -> Ticks {
        self.queue.lock().now
    }

    /// Run everything due at the current tick
    pub fn run_pending(&self) {
        self.advance(0);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance(secs * TICKS_PER_SECOND);
    }

    pub fn advance(&self, ticks: Ticks) {
        let target = self.queue.lock().now + ticks;

        loop {
            let (due, entry) = {
                let mut queue = self.queue.lock();
                let ready = matches!(
                    queue.entries.first_key_value(),
                    Some((&(due, _), _)) if due <= target
                );
                if !ready {
                    queue.now = target;
                    break;
                }
                let Some(((due, _), entry)) = queue.entries.pop_first() else {
                    break;
                };
                queue.now = due;
                (due, entry)
            };

            if entry.handle.is_cancelled() {
                continue;
            }

            match entry.job {
                Job::Once(task) => {
                    task();
                    entry.handle.complete();
                }
                Job::Periodic { period, mut task } => {
                    if let ControlFlow::Break(()) = task() {
                        entry.handle.complete();
                    } else if !entry.handle.is_cancelled() {
                        let id = entry.handle.id();
                        self.queue.lock().entries.insert(
                            (due + period.max(1), id),
                            Entry {
                                handle: entry.handle,
                                job: Job::Periodic { period, task },
                            },
                        );
                    }
                }
            }
        }
    }

    /// Scheduled tasks that have not been cancelled
    pub fn pending_tasks(&self) -> usize {
        self.queue
            .lock()
            .entries
            .values()
            .filter(|entry| !entry.handle.is_cancelled())
            .count()
    }

    fn enqueue(&self, delay: Ticks, job: Job) -> TaskHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = TaskHandle::new(id);
        let mut queue = self.queue.lock();
        let due = queue.now + delay;
        queue.entries.insert(
            (due, id),
            Entry {
                handle: handle.clone(),
                job,
            },
        );
        handle
    }
}

impl Scheduler for ManualScheduler {
    fn run_once(&self, delay: Ticks, task: OnceTask) -> TaskHandle {
        self.enqueue(delay, Job::Once(task))
    }

    fn run_periodic(&self, initial_delay: Ticks, period: Ticks, task: PeriodicTask) -> TaskHandle {
        self.enqueue(initial_delay, Job::Periodic { period, task })
    }

    fn now_millis(&self) -> u64 {
        self.now_ticks() * TICK_MILLIS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    #[test]
    fn test_once_runs_at_due_tick() {
        let scheduler = ManualScheduler::new();
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let handle = scheduler.run_once(
            10,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        scheduler.advance(9);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        scheduler.advance(1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
        assert_eq!(scheduler.now_ticks(), 10);
    }

    #[test]
    fn test_periodic_stops_on_break() {
        let scheduler = ManualScheduler::new();
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let handle = scheduler.run_periodic(
            0,
            20,
            Box::new(move || {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }),
        );

        scheduler.advance_secs(10);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(handle.is_finished());
        assert_eq!(scheduler.pending_tasks(), 0);
    }

    #[test]
    fn test_cancelled_task_never_runs() {
        let scheduler = ManualScheduler::new();
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let handle = scheduler.run_periodic(
            5,
            5,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }),
        );
        handle.cancel();
        scheduler.advance(100);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_task_scheduled_from_task_runs_in_same_advance() {
        let scheduler = Arc::new(ManualScheduler::new());
        let hits = Arc::new(AtomicU32::new(0));
        let inner_scheduler = scheduler.clone();
        let counter = hits.clone();
        scheduler.run_once(
            1,
            Box::new(move || {
                inner_scheduler.run_once(
                    1,
                    Box::new(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );
        scheduler.advance(2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clock_tracks_ticks() {
        let scheduler = ManualScheduler::new();
        scheduler.advance_secs(3);
        assert_eq!(scheduler.now_millis(), 3_000);
    }
}
