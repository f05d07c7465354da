//! Error types for the control loop and its driver boundary.

use thiserror::Error;

/// Errors returned by the driver boundary (GPIO lines, I2C bus, ADC).
///
/// These are the only errors the sensing layer ever sees; everything above
/// the sensing layer converts them into conservative semantic readings
/// (a `TransientSensor` never propagates to the safety evaluator).
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to open GPIO line {chip}:{line}: {source}")]
    GpioOpen {
        chip: String,
        line: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("GPIO I/O error on {chip}:{line}: {source}")]
    GpioIo {
        chip: String,
        line: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open I2C bus {dev}: {source}")]
    I2cOpen {
        dev: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I2C transfer error: {0}")]
    I2cTransfer(String),

    #[error("ADC conversion did not become ready within {0:?}")]
    AdcTimeout(std::time::Duration),

    #[error("ultrasonic echo timed out after {0:?}")]
    UltrasonicTimeout(std::time::Duration),
}

/// Top-level error returned by process startup.
///
/// Any of these aborts the process before the control loop is entered —
/// there is no recovery path for a `FatalInit`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("failed to install signal handler: {0}")]
    SignalHandler(#[from] ctrlc::Error),
}
