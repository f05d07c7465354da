//! Driver boundary: digital I/O, ultrasonic ranging, and the ADC.
//!
//! Everything in this module is the one place the core is allowed to depend
//! on a platform-specific crate. `sensing` and everything above it talk to
//! the traits (`DigitalInput`, `DigitalOutput`, `I2cBus`), never the
//! concrete Linux backends, so the control loop can run against
//! `io::*::sim` fakes in tests without touching real hardware.

pub mod adc;
pub mod pin;
pub mod ultrasonic;
