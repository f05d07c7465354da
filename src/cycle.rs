//! Cycle engine (§4.7): the flap-triggered motor-run state machine.
//!
//! Modeled as a tagged enum rather than a struct with an `active: bool`
//! flag so the compiler enforces that only the `Running` arm can observe
//! in-progress cycle data (start time, current samples).

use crate::clock::Clock;
use std::sync::Arc;

/// Why a cycle ended, in strictly descending check precedence (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEndReason {
    Overcurrent,
    SafetyFault,
    Complete,
    Timeout,
    Shutdown,
}

impl CycleEndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overcurrent => "overcurrent",
            Self::SafetyFault => "safety_fault",
            Self::Complete => "complete",
            Self::Timeout => "timeout",
            Self::Shutdown => "shutdown",
        }
    }
}

/// A completed cycle, ready to be handed to the cycle log.
#[derive(Debug, Clone, Copy)]
pub struct CompletedCycle {
    pub start_wall_s: f64,
    pub end_wall_s: f64,
    pub mean_current_a: f64,
    pub reason: CycleEndReason,
}

enum State {
    Idle,
    Running {
        start_wall_s: f64,
        start_ns: i64,
        samples: Vec<f64>,
    },
}

/// The two-state cycle engine.
pub struct CycleEngine {
    state: State,
    clock: Arc<dyn Clock>,
    motor_overcurrent_a: f64,
    motor_max_run_s: f64,
}

/// What the supervisor should do with the motor output this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCommand {
    EnableIfNotAlready,
    DisableIfNotAlready,
    NoChange,
}

impl CycleEngine {
    pub fn new(clock: Arc<dyn Clock>, motor_overcurrent_a: f64, motor_max_run_s: f64) -> Self {
        Self {
            state: State::Idle,
            clock,
            motor_overcurrent_a,
            motor_max_run_s,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    /// Advance the engine by one tick (§4.7).
    ///
    /// `current_sample` is this tick's motor current reading, if any.
    /// Returns the motor command to apply and, if a cycle just ended, the
    /// completed cycle record to log.
    pub fn tick(
        &mut self,
        flap_open: bool,
        motor_allowed: bool,
        current_sample: Option<f64>,
        shutdown_requested: bool,
    ) -> (MotorCommand, Option<CompletedCycle>) {
        match &mut self.state {
            State::Idle => {
                if flap_open && motor_allowed {
                    self.state = State::Running {
                        start_wall_s: self.clock.wall_seconds(),
                        start_ns: self.clock.now_ns(),
                        samples: Vec::new(),
                    };
                    (MotorCommand::EnableIfNotAlready, None)
                } else {
                    (MotorCommand::NoChange, None)
                }
            }
            State::Running {
                start_wall_s,
                start_ns,
                samples,
            } => {
                if let Some(sample) = current_sample {
                    samples.push(sample);
                }

                let reason = if samples.last().is_some_and(|&s| s > self.motor_overcurrent_a) {
                    Some(CycleEndReason::Overcurrent)
                } else if !motor_allowed {
                    Some(CycleEndReason::SafetyFault)
                } else if shutdown_requested {
                    Some(CycleEndReason::Shutdown)
                } else if !flap_open {
                    Some(CycleEndReason::Complete)
                } else {
                    let elapsed_s = (self.clock.now_ns() - *start_ns) as f64 / 1e9;
                    if elapsed_s > self.motor_max_run_s {
                        Some(CycleEndReason::Timeout)
                    } else {
                        None
                    }
                };

                match reason {
                    Some(reason) => {
                        let mean = if samples.is_empty() {
                            0.0
                        } else {
                            samples.iter().sum::<f64>() / samples.len() as f64
                        };
                        let completed = CompletedCycle {
                            start_wall_s: *start_wall_s,
                            end_wall_s: self.clock.wall_seconds(),
                            mean_current_a: mean,
                            reason,
                        };
                        self.state = State::Idle;
                        (MotorCommand::DisableIfNotAlready, Some(completed))
                    }
                    None => (MotorCommand::NoChange, None),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::sim::FakeClock;
    use std::time::Duration;

    fn engine(clock: Arc<FakeClock>) -> CycleEngine {
        CycleEngine::new(clock, 18.0, 120.0)
    }

    #[test]
    fn idle_stays_idle_without_flap_open() {
        let clock = Arc::new(FakeClock::new());
        let mut e = engine(clock);
        let (cmd, done) = e.tick(false, true, None, false);
        assert_eq!(cmd, MotorCommand::NoChange);
        assert!(done.is_none());
        assert!(!e.is_running());
    }

    #[test]
    fn flap_open_and_allowed_starts_cycle() {
        let clock = Arc::new(FakeClock::new());
        let mut e = engine(clock);
        let (cmd, done) = e.tick(true, true, None, false);
        assert_eq!(cmd, MotorCommand::EnableIfNotAlready);
        assert!(done.is_none());
        assert!(e.is_running());
    }

    #[test]
    fn flap_open_but_not_allowed_does_not_start() {
        let clock = Arc::new(FakeClock::new());
        let mut e = engine(clock);
        let (cmd, _) = e.tick(true, false, None, false);
        assert_eq!(cmd, MotorCommand::NoChange);
        assert!(!e.is_running());
    }

    #[test]
    fn flap_closing_ends_cycle_as_complete() {
        let clock = Arc::new(FakeClock::new());
        let mut e = engine(clock);
        e.tick(true, true, None, false);
        let (cmd, done) = e.tick(false, true, None, false);
        assert_eq!(cmd, MotorCommand::DisableIfNotAlready);
        let done = done.unwrap();
        assert_eq!(done.reason, CycleEndReason::Complete);
        assert_eq!(done.mean_current_a, 0.0);
    }

    #[test]
    fn overcurrent_takes_precedence_over_safety_fault() {
        let clock = Arc::new(FakeClock::new());
        let mut e = engine(clock);
        e.tick(true, true, None, false);
        let (_, done) = e.tick(true, false, Some(22.0), false);
        assert_eq!(done.unwrap().reason, CycleEndReason::Overcurrent);
    }

    #[test]
    fn safety_fault_ends_cycle_when_not_overcurrent() {
        let clock = Arc::new(FakeClock::new());
        let mut e = engine(clock);
        e.tick(true, true, None, false);
        let (_, done) = e.tick(true, false, Some(3.0), false);
        assert_eq!(done.unwrap().reason, CycleEndReason::SafetyFault);
    }

    #[test]
    fn timeout_fires_after_max_run_time() {
        let clock = Arc::new(FakeClock::new());
        let mut e = engine(clock.clone());
        e.tick(true, true, None, false);
        clock.advance(Duration::from_secs(121));
        let (cmd, done) = e.tick(true, true, None, false);
        assert_eq!(cmd, MotorCommand::DisableIfNotAlready);
        assert_eq!(done.unwrap().reason, CycleEndReason::Timeout);
    }

    #[test]
    fn mean_current_is_arithmetic_mean_of_samples() {
        let clock = Arc::new(FakeClock::new());
        let mut e = engine(clock);
        e.tick(true, true, None, false);
        e.tick(true, true, Some(4.0), false);
        e.tick(true, true, Some(6.0), false);
        let (_, done) = e.tick(false, true, Some(5.0), false);
        assert_eq!(done.unwrap().mean_current_a, 5.0);
    }

    #[test]
    fn shutdown_ends_a_running_cycle() {
        let clock = Arc::new(FakeClock::new());
        let mut e = engine(clock);
        e.tick(true, true, None, false);
        let (_, done) = e.tick(true, true, None, true);
        assert_eq!(done.unwrap().reason, CycleEndReason::Shutdown);
    }
}
