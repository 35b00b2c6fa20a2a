//! Task scheduling on the host tick clock
//!
//! Arena timers never hold a handle across a phase change without an epoch
//! check, so a callback that lost a cancellation race still sees it is stale.

pub mod manual;
pub mod runtime;

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::task::AbortHandle;

pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;

pub type Ticks = u64;

pub type OnceTask = Box<dyn FnOnce() + Send + 'static>;

/// Returns `ControlFlow::Break` to stop repeating
pub type PeriodicTask = Box<dyn FnMut() -> ControlFlow<()> + Send + 'static>;

pub trait Scheduler: Send + Sync {
    fn run_once(&self, delay: Ticks, task: OnceTask) -> TaskHandle;

    fn run_periodic(&self, initial_delay: Ticks, period: Ticks, task: PeriodicTask) -> TaskHandle;

    /// Run work that may block on I/O, off the tick path and outside any
    /// arena lock
    fn run_blocking(&self, task: OnceTask) {
        self.run_once(0, task);
    }

    /// Clock used for expiry timestamps
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Default)]
struct TaskFlags {
    cancelled: AtomicBool,
    finished: AtomicBool,
    abort: OnceLock<AbortHandle>,
}

/// Cancellable reference to a scheduled task
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    flags: Arc<TaskFlags>,
}

impl TaskHandle {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            flags: Arc::new(TaskFlags::default()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Tie the handle to a spawned runtime task so cancelling drops it at
    /// its next await point
    pub fn bind_abort(&self, abort: AbortHandle) {
        let _ = self.flags.abort.set(abort);
        if self.is_cancelled() {
            if let Some(abort) = self.flags.abort.get() {
                abort.abort();
            }
        }
    }

    pub fn cancel(&self) {
        self.flags.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = self.flags.abort.get() {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.cancelled.load(Ordering::SeqCst)
    }

    /// Marked by the scheduler once the task will never run again
    pub fn complete(&self) {
        self.flags.finished.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.flags.finished.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        !self.is_cancelled() && !self.is_finished()
    }
}
