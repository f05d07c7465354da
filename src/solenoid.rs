//! Double-acting locking solenoid driver (§4.4).

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::DriverError;
use crate::io::pin::DigitalOutput;

/// The solenoid's believed mechanical state. There is no position feedback,
/// so `Locked`/`Unlocked` are an optimistic belief set by `hint_position`,
/// not a measurement. Safety decisions never depend on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Unknown,
    Locked,
    Unlocked,
    Moving,
}

/// Double-acting solenoid: two coils (forward = lock, reverse = unlock),
/// a dead-time between opposite-polarity assertions, and an on-time cap.
pub struct DoubleSolenoid<O: DigitalOutput> {
    fwd: O,
    rev: O,
    clock: Arc<dyn Clock>,
    dead_time: Duration,
    max_on: Duration,
    on_start_ns: Option<i64>,
    position: Position,
}

impl<O: DigitalOutput> DoubleSolenoid<O> {
    pub fn new(
        fwd: O,
        rev: O,
        clock: Arc<dyn Clock>,
        dead_time: Duration,
        max_on: Duration,
    ) -> Result<Self, DriverError> {
        let mut sol = Self {
            fwd,
            rev,
            clock,
            dead_time,
            max_on,
            on_start_ns: None,
            position: Position::Unknown,
        };
        sol.all_off()?;
        Ok(sol)
    }

    pub fn position(&self) -> Position {
        self.position
    }

    fn all_off(&mut self) -> Result<(), DriverError> {
        self.fwd.set(false)?;
        self.rev.set(false)?;
        Ok(())
    }

    /// Drive toward the locked position.
    pub fn lock(&mut self) -> Result<(), DriverError> {
        self.all_off()?;
        self.clock.sleep(self.dead_time);
        self.rev.set(false)?;
        self.fwd.set(true)?;
        self.on_start_ns = Some(self.clock.now_ns());
        self.position = Position::Moving;
        Ok(())
    }

    /// Drive toward the unlocked position.
    pub fn unlock(&mut self) -> Result<(), DriverError> {
        self.all_off()?;
        self.clock.sleep(self.dead_time);
        self.fwd.set(false)?;
        self.rev.set(true)?;
        self.on_start_ns = Some(self.clock.now_ns());
        self.position = Position::Moving;
        Ok(())
    }

    /// De-energize both coils without changing the believed position.
    pub fn hold(&mut self) -> Result<(), DriverError> {
        self.all_off()?;
        self.on_start_ns = None;
        Ok(())
    }

    /// Called once per supervisor tick: force coils off if a commutation has
    /// been energized longer than `max_on` (§4.4, invariant I4).
    pub fn tick(&mut self) -> Result<(), DriverError> {
        if let Some(start) = self.on_start_ns {
            let elapsed = Duration::from_nanos((self.clock.now_ns() - start).max(0) as u64);
            if elapsed > self.max_on {
                self.all_off()?;
                self.on_start_ns = None;
            }
        }
        Ok(())
    }

    /// Record independent evidence of the mechanical state (e.g. a
    /// commutation pulse has settled) without asserting a coil.
    pub fn hint_position(&mut self, locked: bool) -> Result<(), DriverError> {
        self.position = if locked {
            Position::Locked
        } else {
            Position::Unlocked
        };
        self.on_start_ns = None;
        self.all_off()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::sim::FakeClock;
    use crate::io::pin::sim::FakeOutput;

    fn new_sol(clock: Arc<FakeClock>) -> DoubleSolenoid<FakeOutput> {
        DoubleSolenoid::new(
            FakeOutput::new(),
            FakeOutput::new(),
            clock,
            Duration::from_millis(50),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn starts_unknown_with_coils_off() {
        let clock = Arc::new(FakeClock::new());
        let sol = new_sol(clock);
        assert_eq!(sol.position(), Position::Unknown);
    }

    #[test]
    fn lock_asserts_forward_only() {
        let clock = Arc::new(FakeClock::new());
        let mut sol = new_sol(clock);
        sol.lock().unwrap();
        assert!(sol.fwd.level.get());
        assert!(!sol.rev.level.get());
        assert_eq!(sol.position(), Position::Moving);
    }

    #[test]
    fn max_on_forces_coils_off() {
        let clock = Arc::new(FakeClock::new());
        let mut sol = new_sol(clock.clone());
        sol.lock().unwrap();
        clock.advance(Duration::from_secs(6));
        sol.tick().unwrap();
        assert!(!sol.fwd.level.get());
        assert!(!sol.rev.level.get());
    }

    #[test]
    fn hint_position_never_asserts_a_coil() {
        let clock = Arc::new(FakeClock::new());
        let mut sol = new_sol(clock);
        sol.hint_position(true).unwrap();
        assert_eq!(sol.position(), Position::Locked);
        assert!(!sol.fwd.level.get());
        assert!(!sol.rev.level.get());
    }
}
