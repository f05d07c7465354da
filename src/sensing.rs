//! Sensing layer: composes debounced digital inputs, ultrasonic rangers,
//! and the ADC into semantic readings, converting every driver error into
//! a conservative fallback (§4.6) so nothing above this layer ever sees a
//! `DriverError`.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::clock::Clock;
use crate::config::{AppConfig, CurrentMode};
use crate::io::adc::{Ads1115, I2cBus};
use crate::io::pin::{DebouncedInput, DigitalInput, DigitalOutput};
use crate::io::ultrasonic::{Distance, Ultrasonic};

/// Tote fullness as reported by the level ranger. `Unknown` means the
/// ranger could not produce a reading this tick; callers must treat it as
/// "not allowed" rather than guessing a value (§4.5, invariant I5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tristate {
    Yes,
    No,
    Unknown,
}

/// One tick's worth of semantic sensor state, consumed by the safety
/// evaluator.
#[derive(Debug, Clone, Copy)]
pub struct SafetyView {
    pub mains_ok: bool,
    pub pcb_power_ok: bool,
    pub door_closed: bool,
    pub tote_present: bool,
    pub tote_full: Tristate,
    pub flap_open: bool,
}

/// Everything the sensing layer needs to produce one `SafetyView` plus the
/// motor current reading used by the cycle engine.
pub struct Sensing<O: DigitalOutput, I: DigitalInput, B: I2cBus> {
    flap_open: DebouncedInput<I>,
    door_closed: DebouncedInput<I>,
    mains_present: DebouncedInput<I>,
    tote_present_ranger: Ultrasonic<O, I>,
    tote_level_ranger: Ultrasonic<O, I>,
    adc: Option<Ads1115<B>>,
    clock: Arc<dyn Clock>,

    tote_present_max_cm: f64,
    tote_level_full_cm: f64,
    tote_level_empty_cm: f64,
    mains_required: bool,
    v5_min: f64,
    v33_min: f64,

    ch_motor_current: Option<u8>,
    ch_v5: Option<u8>,
    ch_v33: Option<u8>,
    scale_v5: f64,
    scale_v33: f64,
    current_mode: CurrentMode,
    current_scale: f64,
    ct_bias_vmid: f64,
}

const CT_BIAS_SAMPLES: usize = 50;
const CT_BIAS_SAMPLE_PERIOD: Duration = Duration::from_micros(500); // ~2 kS/s

impl<O: DigitalOutput, I: DigitalInput, B: I2cBus> Sensing<O, I, B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        flap_open: DebouncedInput<I>,
        door_closed: DebouncedInput<I>,
        mains_present: DebouncedInput<I>,
        tote_present_ranger: Ultrasonic<O, I>,
        tote_level_ranger: Ultrasonic<O, I>,
        adc: Option<Ads1115<B>>,
        clock: Arc<dyn Clock>,
        cfg: &AppConfig,
    ) -> Self {
        Self {
            flap_open,
            door_closed,
            mains_present,
            tote_present_ranger,
            tote_level_ranger,
            adc,
            clock,
            tote_present_max_cm: cfg.thresholds.tote_present_max_cm,
            tote_level_full_cm: cfg.thresholds.tote_level_full_cm,
            tote_level_empty_cm: cfg.thresholds.tote_level_empty_cm,
            mains_required: cfg.thresholds.mains_required,
            v5_min: cfg.thresholds.v5_min,
            v33_min: cfg.thresholds.v33_min,
            ch_motor_current: cfg.adc.ch_motor_current,
            ch_v5: cfg.adc.ch_v5,
            ch_v33: cfg.adc.ch_v33,
            scale_v5: cfg.adc.scale_v5,
            scale_v33: cfg.adc.scale_v33,
            current_mode: cfg.adc.current_mode,
            current_scale: cfg.adc.current_scale,
            ct_bias_vmid: cfg.adc.ct_bias_vmid,
        }
    }

    fn read_ultra_cm(ranger: &mut Ultrasonic<O, I>, label: &str) -> Option<f64> {
        match ranger.measure_cm() {
            Ok(Distance::Cm(d)) => Some(d),
            Ok(Distance::Unknown) => None,
            Err(e) => {
                warn!("{label} ultrasonic read error: {e}");
                None
            }
        }
    }

    pub fn flap_open(&mut self) -> bool {
        self.flap_open.read_debounced().unwrap_or(false)
    }

    pub fn door_closed(&mut self) -> bool {
        self.door_closed.read_debounced().unwrap_or(false)
    }

    pub fn mains_ok(&mut self) -> bool {
        if !self.mains_required {
            return true;
        }
        self.mains_present.read_debounced().unwrap_or(false)
    }

    pub fn tote_present(&mut self) -> bool {
        match Self::read_ultra_cm(&mut self.tote_present_ranger, "tote-present") {
            Some(d) => d <= self.tote_present_max_cm,
            None => false,
        }
    }

    pub fn tote_full(&mut self) -> Tristate {
        match Self::read_ultra_cm(&mut self.tote_level_ranger, "tote-level") {
            Some(d) => {
                if d <= self.tote_level_full_cm {
                    Tristate::Yes
                } else {
                    Tristate::No
                }
            }
            None => Tristate::Unknown,
        }
    }

    /// Fill percentage (§6.2), `None` if the level ranger could not measure.
    pub fn tote_fill_percent(&mut self) -> Option<f64> {
        let d = Self::read_ultra_cm(&mut self.tote_level_ranger, "tote-level")?;
        let empty = self.tote_level_empty_cm;
        let full = self.tote_level_full_cm;
        let pct = 100.0 * ((empty - d) / (empty - full)).clamp(0.0, 1.0);
        Some(pct)
    }

    pub fn pcb_power_ok(&mut self) -> bool {
        let Some(adc) = self.adc.as_mut() else {
            return true;
        };
        let v5 = match self.ch_v5 {
            Some(ch) => match adc.read_single(ch) {
                Ok(v) => v * self.scale_v5,
                Err(e) => {
                    warn!("adc v5 read error: {e}");
                    return false;
                }
            },
            None => 5.0,
        };
        let v33 = match self.ch_v33 {
            Some(ch) => match adc.read_single(ch) {
                Ok(v) => v * self.scale_v33,
                Err(e) => {
                    warn!("adc v33 read error: {e}");
                    return false;
                }
            },
            None => 3.3,
        };
        v5 >= self.v5_min && v33 >= self.v33_min
    }

    /// One motor current sample in amperes, or `None` if current sensing is
    /// disabled or the ADC faulted this tick.
    pub fn motor_current_sample(&mut self) -> Option<f64> {
        let ch = self.ch_motor_current?;
        let adc = self.adc.as_mut()?;
        match self.current_mode {
            CurrentMode::Transducer => match adc.read_single(ch) {
                Ok(v) => Some((v * self.current_scale).max(0.0)),
                Err(e) => {
                    warn!("adc current read error: {e}");
                    None
                }
            },
            CurrentMode::CtBias => {
                let mut sum_sq = 0.0f64;
                for _ in 0..CT_BIAS_SAMPLES {
                    match adc.read_single(ch) {
                        Ok(v) => {
                            let d = v - self.ct_bias_vmid;
                            sum_sq += d * d;
                        }
                        Err(e) => {
                            warn!("adc current read error: {e}");
                            return None;
                        }
                    }
                    self.clock.sleep(CT_BIAS_SAMPLE_PERIOD);
                }
                let v_rms = (sum_sq / CT_BIAS_SAMPLES as f64).sqrt();
                Some(v_rms * self.current_scale)
            }
        }
    }

    /// Compose every reading into one `SafetyView` snapshot for this tick.
    pub fn safety_view(&mut self) -> SafetyView {
        SafetyView {
            mains_ok: self.mains_ok(),
            pcb_power_ok: self.pcb_power_ok(),
            door_closed: self.door_closed(),
            tote_present: self.tote_present(),
            tote_full: self.tote_full(),
            flap_open: self.flap_open(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_percent_clamps_at_bounds() {
        let empty: f64 = 45.0;
        let full: f64 = 10.0;
        let pct_over_full = 100.0 * ((empty - 2.0) / (empty - full)).clamp(0.0, 1.0);
        assert_eq!(pct_over_full, 100.0);
        let pct_under_empty = 100.0 * ((empty - 80.0) / (empty - full)).clamp(0.0, 1.0);
        assert_eq!(pct_under_empty, 0.0);
    }
}
