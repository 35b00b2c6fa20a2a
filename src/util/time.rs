//! Time utilities for arena scheduling

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Scheduler tick rate
pub const TICKS_PER_SECOND: u64 = 20;
pub const TICK_MILLIS: u64 = 1_000 / TICKS_PER_SECOND;

/// Convert whole seconds to scheduler ticks
pub fn secs_to_ticks(secs: u64) -> u64 {
    secs.saturating_mul(TICKS_PER_SECOND)
}

/// Wall-clock duration of a tick count
pub fn ticks_to_duration(ticks: u64) -> Duration {
    Duration::from_millis(ticks.saturating_mul(TICK_MILLIS))
}

/// Format remaining seconds as `MM:SS`, clamping negatives to zero
pub fn format_clock(total_secs: i64) -> String {
    let total = total_secs.max(0);
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// A simple timer for measuring durations
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(75), "01:15");
        assert_eq!(format_clock(600), "10:00");
        assert_eq!(format_clock(-4), "00:00");
    }

    #[test]
    fn test_tick_conversions() {
        assert_eq!(secs_to_ticks(15), 300);
        assert_eq!(ticks_to_duration(20), Duration::from_secs(1));
        assert_eq!(ticks_to_duration(1), Duration::from_millis(TICK_MILLIS));
    }
}
