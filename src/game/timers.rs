//! Per-arena timer slots with generation tokens
//!
//! Each timer kind holds at most one live handle. Arming a kind cancels the
//! previous handle and bumps its epoch; a callback that fires after losing
//! that race compares its captured [`Epoch`] and discards itself.

use crate::scheduler::TaskHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Countdown,
    MatchClock,
    Invincibility,
    EndDelay,
    Regeneration,
}

impl TimerKind {
    pub const ALL: [TimerKind; 5] = [
        TimerKind::Countdown,
        TimerKind::MatchClock,
        TimerKind::Invincibility,
        TimerKind::EndDelay,
        TimerKind::Regeneration,
    ];

    fn index(self) -> usize {
        match self {
            TimerKind::Countdown => 0,
            TimerKind::MatchClock => 1,
            TimerKind::Invincibility => 2,
            TimerKind::EndDelay => 3,
            TimerKind::Regeneration => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    kind: TimerKind,
    value: u64,
}

impl Epoch {
    pub fn kind(&self) -> TimerKind {
        self.kind
    }
}

#[derive(Debug, Default)]
struct Slot {
    handle: Option<TaskHandle>,
    epoch: u64,
}

#[derive(Debug, Default)]
pub struct Timers {
    slots: [Slot; 5],
    /// Short one-off tasks outside the single-slot kinds
    grace: Vec<TaskHandle>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate the current task of `kind` and open a new generation
    pub fn arm(&mut self, kind: TimerKind) -> Epoch {
        let slot = &mut self.slots[kind.index()];
        if let Some(old) = slot.handle.take() {
            old.cancel();
        }
        slot.epoch += 1;
        Epoch {
            kind,
            value: slot.epoch,
        }
    }

    /// Store the handle for `epoch`; a handle for a stale epoch is cancelled
    pub fn attach(&mut self, epoch: Epoch, handle: TaskHandle) {
        let slot = &mut self.slots[epoch.kind.index()];
        if slot.epoch != epoch.value {
            handle.cancel();
            return;
        }
        let new_id = handle.id();
        if let Some(old) = slot.handle.replace(handle) {
            if old.id() != new_id {
                old.cancel();
            }
        }
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.slots[epoch.kind.index()].epoch == epoch.value
    }

    /// The task for `epoch` completed on its own
    pub fn finish(&mut self, epoch: Epoch) {
        let slot = &mut self.slots[epoch.kind.index()];
        if slot.epoch == epoch.value {
            slot.handle = None;
        }
    }

    pub fn disarm(&mut self, kind: TimerKind) {
        let slot = &mut self.slots[kind.index()];
        if let Some(handle) = slot.handle.take() {
            handle.cancel();
        }
        slot.epoch += 1;
    }

    /// Cancel every task this arena owns
    pub fn disarm_all(&mut self) {
        for kind in TimerKind::ALL {
            self.disarm(kind);
        }
        for handle in self.grace.drain(..) {
            handle.cancel();
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.slots[kind.index()]
            .handle
            .as_ref()
            .is_some_and(TaskHandle::is_active)
    }

    pub fn track_grace(&mut self, handle: TaskHandle) {
        self.grace.retain(TaskHandle::is_active);
        self.grace.push(handle);
    }

    /// Handles that may still fire
    pub fn live_handles(&self) -> usize {
        let slots = self
            .slots
            .iter()
            .filter(|slot| slot.handle.as_ref().is_some_and(TaskHandle::is_active))
            .count();
        slots + self.grace.iter().filter(|h| h.is_active()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rearm_cancels_previous_and_stales_epoch() {
        let mut timers = Timers::new();
        let first = timers.arm(TimerKind::Countdown);
        let first_handle = TaskHandle::new(1);
        timers.attach(first, first_handle.clone());
        assert!(timers.is_armed(TimerKind::Countdown));

        let second = timers.arm(TimerKind::Countdown);
        assert!(first_handle.is_cancelled());
        assert!(!timers.is_current(first));
        assert!(timers.is_current(second));
    }

    #[test]
    fn test_attach_to_stale_epoch_cancels_handle() {
        let mut timers = Timers::new();
        let epoch = timers.arm(TimerKind::MatchClock);
        timers.disarm(TimerKind::MatchClock);
        let handle = TaskHandle::new(9);
        timers.attach(epoch, handle.clone());
        assert!(handle.is_cancelled());
        assert!(!timers.is_armed(TimerKind::MatchClock));
    }

    #[test]
    fn test_disarm_all_cancels_grace_tasks() {
        let mut timers = Timers::new();
        let epoch = timers.arm(TimerKind::EndDelay);
        timers.attach(epoch, TaskHandle::new(1));
        let grace = TaskHandle::new(2);
        timers.track_grace(grace.clone());
        assert_eq!(timers.live_handles(), 2);

        timers.disarm_all();
        assert!(grace.is_cancelled());
        assert_eq!(timers.live_handles(), 0);
        assert!(!timers.is_current(epoch));
    }

    #[test]
    fn test_finish_keeps_epoch() {
        let mut timers = Timers::new();
        let epoch = timers.arm(TimerKind::Invincibility);
        timers.attach(epoch, TaskHandle::new(3));
        timers.finish(epoch);
        assert!(!timers.is_armed(TimerKind::Invincibility));
        assert!(timers.is_current(epoch));
    }
}
