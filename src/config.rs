//! TOML configuration loading and validation.
//!
//! Mirrors the workspace's usual config pattern: a plain `serde`-derived
//! struct tree, a `load_config` entry point for production use, and a
//! `load_config_from_str` entry point so unit tests never touch the
//! filesystem. All bounds are checked before any GPIO or I2C handle is
//! opened, so a bad config is a `FatalInit`, never a `TransientSensor`.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Configuration loading/validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// One GPIO line: a chip device path, a line offset, and its active polarity.
#[derive(Debug, Clone, Deserialize)]
pub struct PinDescriptor {
    pub chip: String,
    pub line: u32,
    #[serde(default = "default_true")]
    pub active_high: bool,
}

fn default_true() -> bool {
    true
}

/// Hardware pin mapping for every digital signal the core drives or reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PinsConfig {
    pub motor_en: PinDescriptor,
    pub sol_lock_fwd: PinDescriptor,
    pub sol_lock_rev: PinDescriptor,

    pub flap_open_reed: PinDescriptor,
    pub door_closed_reed: PinDescriptor,
    pub mains_present: PinDescriptor,

    pub tote_present_trig: PinDescriptor,
    pub tote_present_echo: PinDescriptor,

    pub tote_level_trig: PinDescriptor,
    pub tote_level_echo: PinDescriptor,
}

/// ADC channel current-sensing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentMode {
    /// 0..Vref proportional to instantaneous current.
    Transducer,
    /// AC signal centered on `ct_bias_vmid`; core computes RMS over a window.
    CtBias,
}

/// ADS1115 routing and scaling.
#[derive(Debug, Clone, Deserialize)]
pub struct AdcConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub i2c_dev: String,
    pub addr: u16,

    #[serde(default)]
    pub ch_motor_current: Option<u8>,
    #[serde(default)]
    pub ch_v5: Option<u8>,
    #[serde(default)]
    pub ch_v33: Option<u8>,

    pub scale_v5: f64,
    pub scale_v33: f64,

    pub current_mode: CurrentMode,
    pub current_scale: f64,
    pub ct_bias_vmid: f64,
}

/// Safety and sensing thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdsConfig {
    pub tote_present_max_cm: f64,
    pub tote_level_full_cm: f64,
    pub tote_level_empty_cm: f64,
    pub mains_required: bool,
    pub v5_min: f64,
    pub v33_min: f64,
    pub motor_overcurrent_a: f64,
    pub motor_max_run_s: f64,
    pub debounce_ms: u64,
    pub ultrasonic_timeout_s: f64,
}

/// Solenoid commutation timing.
#[derive(Debug, Clone, Deserialize)]
pub struct SolenoidConfig {
    pub deadtime_ms: u64,
    pub max_on_s: f64,
}

/// Filesystem paths the core writes to.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    pub cycle_log_csv: String,
}

/// The complete, validated configuration bundle.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub pins: PinsConfig,
    pub adc: AdcConfig,
    pub thresholds: ThresholdsConfig,
    pub solenoid: SolenoidConfig,
    pub paths: PathsConfig,
}

impl AppConfig {
    /// Check the bounds that must hold before any driver is opened.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        if t.debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "thresholds.debounce_ms must be > 0".into(),
            ));
        }
        if t.ultrasonic_timeout_s <= 0.0 {
            return Err(ConfigError::Validation(
                "thresholds.ultrasonic_timeout_s must be > 0".into(),
            ));
        }
        if t.tote_level_full_cm >= t.tote_level_empty_cm {
            return Err(ConfigError::Validation(
                "thresholds.tote_level_full_cm must be < tote_level_empty_cm".into(),
            ));
        }
        if t.v5_min <= 0.0 || t.v33_min <= 0.0 {
            return Err(ConfigError::Validation(
                "thresholds.v5_min and v33_min must be > 0".into(),
            ));
        }
        if t.motor_overcurrent_a <= 0.0 {
            return Err(ConfigError::Validation(
                "thresholds.motor_overcurrent_a must be > 0".into(),
            ));
        }
        if t.motor_max_run_s <= 0.0 {
            return Err(ConfigError::Validation(
                "thresholds.motor_max_run_s must be > 0".into(),
            ));
        }

        let s = &self.solenoid;
        if s.deadtime_ms == 0 {
            return Err(ConfigError::Validation(
                "solenoid.deadtime_ms must be > 0".into(),
            ));
        }
        if s.max_on_s <= 0.0 {
            return Err(ConfigError::Validation(
                "solenoid.max_on_s must be > 0".into(),
            ));
        }

        if self.adc.enabled {
            let mut channels = Vec::new();
            for ch in [
                self.adc.ch_motor_current,
                self.adc.ch_v5,
                self.adc.ch_v33,
            ]
            .into_iter()
            .flatten()
            {
                if ch > 3 {
                    return Err(ConfigError::Validation(format!(
                        "adc channel index {ch} out of range 0..=3"
                    )));
                }
                channels.push(ch);
            }
            let mut seen = channels.clone();
            seen.sort_unstable();
            seen.dedup();
            if seen.len() != channels.len() {
                return Err(ConfigError::Validation(
                    "adc channel assignments must be distinct".into(),
                ));
            }
        }

        Ok(())
    }
}

/// Load and validate configuration from a TOML file on disk.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_config_from_str(&text)
}

/// Load and validate configuration from a TOML string (used by tests).
pub fn load_config_from_str(text: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}
