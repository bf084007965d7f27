//! Time sources for the hub.
//!
//! The hub needs two clocks: wall-clock time for stamping samples, and a
//! monotonic clock for the rate filter and backup scheduling. Both come
//! from a [`Clock`] so tests can drive time by hand.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A pair of time sources.
pub trait Clock: Send {
    /// Seconds since the Unix epoch.
    fn wall_time(&self) -> f64;

    /// Time elapsed on a monotonic clock since an arbitrary fixed origin.
    fn monotonic(&self) -> Duration;
}

/// The real system clocks.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn wall_time(&self) -> f64 {
        chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }

    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }
}

#[derive(Debug)]
struct ManualState {
    wall: f64,
    monotonic: Duration,
}

/// A clock that only moves when told to.
///
/// Clones share the same state, so a test can keep one handle and give
/// another to the hub.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    /// Start at the given wall time with the monotonic clock at zero.
    pub fn new(wall: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                wall,
                monotonic: Duration::ZERO,
            })),
        }
    }

    /// Move both clocks forward by `secs` seconds.
    pub fn advance(&self, secs: f64) {
        let mut state = self.lock();
        state.wall += secs;
        state.monotonic += Duration::from_secs_f64(secs);
    }

    /// Set the wall clock without touching the monotonic clock.
    pub fn set_wall_time(&self, wall: f64) {
        self.lock().wall = wall;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        // A poisoned clock only means a test panicked mid-update; the value is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn wall_time(&self) -> f64 {
        self.lock().wall
    }

    fn monotonic(&self) -> Duration {
        self.lock().monotonic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new(1_000.0);
        let handle = clock.clone();
        handle.advance(2.5);
        assert_eq!(clock.wall_time(), 1_002.5);
        assert_eq!(clock.monotonic(), Duration::from_millis(2500));

        handle.set_wall_time(5.0);
        assert_eq!(clock.wall_time(), 5.0);
        assert_eq!(clock.monotonic(), Duration::from_millis(2500));
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock::new();
        let a = clock.monotonic();
        let b = clock.monotonic();
        assert!(b >= a);
        assert!(clock.wall_time() > 1_600_000_000.0);
    }
}
