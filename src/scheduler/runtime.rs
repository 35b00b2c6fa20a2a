//! Tokio-backed scheduler for live servers

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Handle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::trace;

use super::{OnceTask, PeriodicTask, Scheduler, TaskHandle, Ticks};
use crate::util::time::{ticks_to_duration, unix_millis};

/// Each scheduled task is a spawned future, aborted when its handle is
/// cancelled. Callbacks run on runtime worker threads; blocking work goes to
/// the runtime's blocking pool.
pub struct TokioScheduler {
    runtime: Handle,
    next_id: AtomicU64,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(1),
        }
    }

    /// Bind to the runtime of the calling context
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    fn next_handle(&self) -> TaskHandle {
        TaskHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Scheduler for TokioScheduler {
    fn run_once(&self, delay: Ticks, task: OnceTask) -> TaskHandle {
        let handle = self.next_handle();
        let guard = handle.clone();

        let spawned = self.runtime.spawn(async move {
            sleep(ticks_to_duration(delay)).await;
            if guard.is_cancelled() {
                trace!(task_id = guard.id(), "Skipping cancelled task");
                return;
            }
            task();
            guard.complete();
        });
        handle.bind_abort(spawned.abort_handle());

        handle
    }

    fn run_periodic(&self, initial_delay: Ticks, period: Ticks, mut task: PeriodicTask) -> TaskHandle {
        let handle = self.next_handle();
        let guard = handle.clone();

        let spawned = self.runtime.spawn(async move {
            if initial_delay > 0 {
                sleep(ticks_to_duration(initial_delay)).await;
            }

            let mut ticker = interval(ticks_to_duration(period.max(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if guard.is_cancelled() {
                    break;
                }
                if let ControlFlow::Break(()) = task() {
                    guard.complete();
                    break;
                }
            }
        });
        handle.bind_abort(spawned.abort_handle());

        handle
    }

    fn run_blocking(&self, task: OnceTask) {
        self.runtime.spawn_blocking(task);
    }

    fn now_millis(&self) -> u64 {
        unix_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_once_fires_after_delay() {
        let scheduler = TokioScheduler::current();
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();

        let handle = scheduler.run_once(
            20,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_sleeping_task() {
        let scheduler = TokioScheduler::current();
        let token = Arc::new(());
        let held = token.clone();

        let handle = scheduler.run_once(
            20 * 60,
            Box::new(move || drop(held)),
        );
        tokio::task::yield_now().await;
        assert_eq!(Arc::strong_count(&token), 2);

        handle.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(Arc::strong_count(&token), 1);
        assert!(!handle.is_finished());
    }

    #[tokio::test]
    async fn test_blocking_work_runs() {
        let scheduler = TokioScheduler::current();
        let (tx, rx) = tokio::sync::oneshot::channel();
        scheduler.run_blocking(Box::new(move || {
            let _ = tx.send(std::thread::current().name().map(str::to_string));
        }));
        assert!(rx.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_periodic_stops() {
        let scheduler = TokioScheduler::current();
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();

        let handle = scheduler.run_periodic(
            0,
            20,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }),
        );

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        handle.cancel();
        let seen = hits.load(Ordering::SeqCst);
        assert!(seen >= 2);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(hits.load(Ordering::SeqCst), seen);
    }
}
