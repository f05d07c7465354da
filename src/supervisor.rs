//! Supervisor loop (§4.9): one tick = solenoid housekeeping, sensing,
//! solenoid commutation, cycle-engine step, periodic status log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::cycle::{CycleEndReason, CycleEngine, MotorCommand};
use crate::cyclelog::CycleLog;
use crate::io::adc::I2cBus;
use crate::io::pin::{DigitalInput, DigitalOutput};
use crate::safety;
use crate::sensing::Sensing;
use crate::solenoid::{DoubleSolenoid, Position};

const TICK_PERIOD: Duration = Duration::from_millis(10);
const STATUS_PERIOD_S: f64 = 1.0;

/// Owns every actuator and sensor and drives one tick at a time.
pub struct Supervisor<MO: DigitalOutput, SO: DigitalOutput, I: DigitalInput, B: I2cBus> {
    clock: Arc<dyn Clock>,
    motor_en: MO,
    solenoid: DoubleSolenoid<SO>,
    sensing: Sensing<SO, I, B>,
    cycle: CycleEngine,
    log: CycleLog,
    last_status_s: f64,
}

impl<MO: DigitalOutput, SO: DigitalOutput, I: DigitalInput, B: I2cBus> Supervisor<MO, SO, I, B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: Arc<dyn Clock>,
        motor_en: MO,
        solenoid: DoubleSolenoid<SO>,
        sensing: Sensing<SO, I, B>,
        cycle: CycleEngine,
        log: CycleLog,
    ) -> Self {
        log.ensure_initialized();
        Self {
            last_status_s: clock.wall_seconds(),
            clock,
            motor_en,
            solenoid,
            sensing,
            cycle,
            log,
        }
    }

    /// Boot policy: evaluate safety once and command the initial lock state
    /// (§4.9). Must be called before `tick` is first invoked.
    pub fn boot(&mut self) -> Result<(), crate::error::DriverError> {
        self.motor_en.set(false)?;
        let view = self.sensing.safety_view();
        let decision = safety::evaluate(&view);
        if decision.unlock_allowed {
            self.solenoid.unlock()?;
            self.clock.sleep(Duration::from_millis(100));
            self.solenoid.hold()?;
            self.solenoid.hint_position(false)?;
        } else {
            self.solenoid.lock()?;
            self.clock.sleep(Duration::from_millis(100));
            self.solenoid.hold()?;
            self.solenoid.hint_position(true)?;
        }
        Ok(())
    }

    /// Run one supervisor tick (§4.9, steps 1-5). Returns whether a motor
    /// command was actually issued this tick, for the caller's tests.
    pub fn tick(&mut self, shutdown_requested: bool) -> Result<(), crate::error::DriverError> {
        self.solenoid.tick()?;

        let view = self.sensing.safety_view();
        let decision = safety::evaluate(&view);

        if decision.unlock_allowed {
            if self.solenoid.position() != Position::Unlocked {
                self.solenoid.unlock()?;
                self.clock.sleep(Duration::from_millis(100));
                self.solenoid.hold()?;
                self.solenoid.hint_position(false)?;
            }
        } else if self.solenoid.position() != Position::Locked {
            self.solenoid.lock()?;
            self.clock.sleep(Duration::from_millis(100));
            self.solenoid.hold()?;
            self.solenoid.hint_position(true)?;
        }

        let current_sample = if self.cycle.is_running() {
            self.sensing.motor_current_sample()
        } else {
            None
        };

        let (cmd, completed) = self.cycle.tick(
            view.flap_open,
            decision.motor_allowed,
            current_sample,
            shutdown_requested,
        );

        match cmd {
            MotorCommand::EnableIfNotAlready => {
                self.motor_en.set(true)?;
                info!("motor enabled (cycle start)");
            }
            MotorCommand::DisableIfNotAlready => {
                self.motor_en.set(false)?;
                if let Some(c) = completed {
                    info!(
                        "motor disabled (cycle end) reason={} duration={:.2}s mean_current={:.2}A",
                        c.reason.as_str(),
                        c.end_wall_s - c.start_wall_s,
                        c.mean_current_a
                    );
                    self.log.append(&c);
                    if c.reason == CycleEndReason::Overcurrent {
                        self.solenoid.lock()?;
                        self.clock.sleep(Duration::from_millis(100));
                        self.solenoid.hold()?;
                        self.solenoid.hint_position(true)?;
                    }
                }
            }
            MotorCommand::NoChange => {}
        }

        let now = self.clock.wall_seconds();
        if now - self.last_status_s >= STATUS_PERIOD_S {
            self.last_status_s = now;
            debug!(
                "status: mains_ok={} pcb_power_ok={} door_closed={} tote_present={} tote_full={:?}",
                view.mains_ok, view.pcb_power_ok, view.door_closed, view.tote_present, view.tote_full
            );
        }

        Ok(())
    }

    /// Shutdown sequence (§4.9): terminate any running cycle, force lock.
    pub fn shutdown(&mut self) -> Result<(), crate::error::DriverError> {
        if self.cycle.is_running() {
            self.tick(true)?;
        }
        self.motor_en.set(false)?;
        self.solenoid.lock()?;
        self.clock.sleep(Duration::from_millis(100));
        self.solenoid.hold()?;
        self.solenoid.hint_position(true)?;
        Ok(())
    }

    /// Run until `running` is cleared, sleeping `TICK_PERIOD` between ticks.
    pub fn run(&mut self, running: &AtomicBool) -> Result<(), crate::error::DriverError> {
        while running.load(Ordering::SeqCst) {
            self.tick(false)?;
            self.clock.sleep(TICK_PERIOD);
        }
        self.shutdown()
    }
}
