//! Safety-interlocked control loop for a tote-cell recycling appliance.
//!
//! Supervises one induction motor (via contactor), one double-acting
//! locking solenoid, and the sensors that together decide whether it is
//! safe to unlock the flap or run the motor: a door reed, a flap reed, a
//! mains-present opto-detector, tote-present/tote-level ultrasonic
//! rangers, rail-voltage ADC monitors, and a motor current transducer.
//!
//! `safety` is the load-bearing module: a pure predicate with no I/O,
//! everything else exists to feed it accurate readings and act on its
//! verdict.

pub mod clock;
pub mod config;
pub mod cycle;
pub mod cyclelog;
pub mod error;
pub mod io;
pub mod safety;
pub mod sensing;
pub mod solenoid;
pub mod supervisor;
