//! Monotonic and wall-clock time source.
//!
//! Abstracted behind a trait so the integration tests can drive the
//! supervisor with a fake clock and express scenario timings ("flap opens
//! at t=1.0s") exactly instead of approximating them with real sleeps.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time source consumed by every timed component (debounce, ultrasonic
/// timeout, solenoid dead-time/max-on, cycle duration, status cadence).
pub trait Clock: Send + Sync {
    /// Monotonic instant, in nanoseconds, with an arbitrary epoch.
    fn now_ns(&self) -> i64;

    /// Wall-clock time, seconds since the Unix epoch.
    fn wall_seconds(&self) -> f64;

    /// Block the calling thread for `d`.
    fn sleep(&self, d: Duration);
}

/// Real clock backed by `std::time`.
#[derive(Debug)]
pub struct SystemClock {
    epoch: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ns(&self) -> i64 {
        self.epoch.elapsed().as_nanos() as i64
    }

    fn wall_seconds(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Simulated backends used by tests and by `--simulate` runs.
pub mod sim {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Deterministic clock for tests: `sleep` advances the clock instead of
    /// blocking, so scenario timings execute at simulated speed.
    pub struct FakeClock {
        now_ns: AtomicI64,
        wall_base: f64,
    }

    impl FakeClock {
        pub fn new() -> Self {
            Self {
                now_ns: AtomicI64::new(0),
                wall_base: 1_700_000_000.0,
            }
        }

        pub fn advance(&self, d: Duration) {
            self.now_ns.fetch_add(d.as_nanos() as i64, Ordering::SeqCst);
        }
    }

    impl Clock for FakeClock {
        fn now_ns(&self) -> i64 {
            self.now_ns.load(Ordering::SeqCst)
        }

        fn wall_seconds(&self) -> f64 {
            self.wall_base + (self.now_ns.load(Ordering::SeqCst) as f64) / 1e9
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }
    }
}
