//! HC-SR04-style trigger/echo ultrasonic ranger.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::DriverError;

use super::pin::{DigitalInput, DigitalOutput};

const SPEED_OF_SOUND_CM_PER_S: f64 = 34_300.0;

/// A measured distance, or the sensor's inability to measure one this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distance {
    Cm(f64),
    Unknown,
}

/// One HC-SR04-style ranger: a trigger output and an echo input, sharing a
/// per-edge timeout.
pub struct Ultrasonic<O: DigitalOutput, I: DigitalInput> {
    trig: O,
    echo: I,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl<O: DigitalOutput, I: DigitalInput> Ultrasonic<O, I> {
    pub fn new(trig: O, echo: I, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            trig,
            echo,
            clock,
            timeout,
        }
    }

    /// Perform one trigger/echo cycle and return the measured distance
    /// (§4.2). Never leaves the trigger asserted, even on timeout.
    pub fn measure_cm(&mut self) -> Result<Distance, DriverError> {
        self.trig.set(false)?;
        self.clock.sleep(Duration::from_micros(2));
        self.trig.set(true)?;
        self.clock.sleep(Duration::from_micros(10));
        self.trig.set(false)?;

        let rise = self.wait_for_level(true)?;
        if rise.is_none() {
            return Ok(Distance::Unknown);
        }
        let start = self.clock.now_ns();

        let fall = self.wait_for_level(false)?;
        if fall.is_none() {
            return Ok(Distance::Unknown);
        }
        let end = self.clock.now_ns();

        let dt_s = (end - start) as f64 / 1e9;
        Ok(Distance::Cm(dt_s * SPEED_OF_SOUND_CM_PER_S / 2.0))
    }

    /// Busy-wait (with a short poll sleep) for the echo pin to reach
    /// `target`, bounded by `self.timeout`. Returns `None` on timeout.
    fn wait_for_level(&mut self, target: bool) -> Result<Option<()>, DriverError> {
        const POLL_INTERVAL: Duration = Duration::from_micros(10);
        let deadline = self.clock.now_ns() + self.timeout.as_nanos() as i64;
        loop {
            if self.echo.read_raw()? == target {
                return Ok(Some(()));
            }
            if self.clock.now_ns() > deadline {
                return Ok(None);
            }
            self.clock.sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::sim::FakeClock;
    use crate::io::pin::sim::{FakeInput, FakeOutput, SharedLevel};

    #[test]
    fn timeout_on_no_echo_returns_unknown() {
        let clock = Arc::new(FakeClock::new());
        let trig = FakeOutput::new();
        let echo_level = SharedLevel::new(false);
        let echo = FakeInput::new(echo_level);
        let mut u = Ultrasonic::new(trig, echo, clock, Duration::from_millis(25));
        assert_eq!(u.measure_cm().unwrap(), Distance::Unknown);
    }

    #[test]
    fn trigger_is_deasserted_after_measurement() {
        let clock = Arc::new(FakeClock::new());
        let trig = FakeOutput::new();
        let trig_level = trig.level.clone();
        let echo_level = SharedLevel::new(false);
        let echo = FakeInput::new(echo_level);
        let mut u = Ultrasonic::new(trig, echo, clock, Duration::from_millis(25));
        let _ = u.measure_cm();
        assert!(!trig_level.get());
    }
}
