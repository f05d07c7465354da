//! Digital I/O: polarity-adjusted pins and a debounced input wrapper.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::PinDescriptor;
use crate::error::DriverError;

/// A single polarity-adjusted digital output.
pub trait DigitalOutput: Send {
    /// Drive the pin to the logical level `v` (active-high/low already applied).
    fn set(&mut self, v: bool) -> Result<(), DriverError>;
}

/// A single polarity-adjusted digital input.
pub trait DigitalInput: Send {
    /// Read the instantaneous logical level (active-high/low already applied).
    fn read_raw(&mut self) -> Result<bool, DriverError>;
}

/// Debounced wrapper around a raw `DigitalInput`.
///
/// The reported value only advances once the raw reading has held the new
/// level continuously for at least the debounce window. Critically, any
/// reading that equals the current stable value refreshes the candidate
/// timer — a single-tick glitch back to the stable value delays acceptance
/// of a pending change rather than being ignored outright.
pub struct DebouncedInput<I: DigitalInput> {
    raw: I,
    clock: Arc<dyn Clock>,
    debounce_ns: i64,
    last_stable: bool,
    last_change_ns: i64,
}

impl<I: DigitalInput> DebouncedInput<I> {
    pub fn new(mut raw: I, clock: Arc<dyn Clock>, debounce_ms: u64) -> Result<Self, DriverError> {
        let initial = raw.read_raw()?;
        let now = clock.now_ns();
        Ok(Self {
            raw,
            clock,
            debounce_ns: debounce_ms as i64 * 1_000_000,
            last_stable: initial,
            last_change_ns: now,
        })
    }

    /// Debounced read (§4.1).
    pub fn read_debounced(&mut self) -> Result<bool, DriverError> {
        let now = self.clock.now_ns();
        let v = self.raw.read_raw()?;
        if v != self.last_stable {
            if now - self.last_change_ns >= self.debounce_ns {
                self.last_stable = v;
                self.last_change_ns = now;
            }
        } else {
            self.last_change_ns = now;
        }
        Ok(self.last_stable)
    }
}

/// Construct the logical value for an output command, respecting polarity.
pub fn apply_polarity_out(active_high: bool, v: bool) -> bool {
    if active_high {
        v
    } else {
        !v
    }
}

/// Convert a raw electrical level into a logical value, respecting polarity.
pub fn apply_polarity_in(active_high: bool, raw: bool) -> bool {
    if active_high {
        raw
    } else {
        !raw
    }
}

/// Linux character-device GPIO backend (`/dev/gpiochipN`).
pub mod linux {
    use super::*;
    use gpio_cdev::{Chip, LineRequestFlags};

    pub struct GpioOutput {
        line: gpio_cdev::LineHandle,
        active_high: bool,
        desc: String,
    }

    impl GpioOutput {
        pub fn open(desc: &PinDescriptor, consumer: &str) -> Result<Self, DriverError> {
            let mut chip = Chip::new(&desc.chip).map_err(|e| DriverError::GpioOpen {
                chip: desc.chip.clone(),
                line: desc.line,
                source: std::io::Error::other(e),
            })?;
            let line = chip.get_line(desc.line).map_err(|e| DriverError::GpioOpen {
                chip: desc.chip.clone(),
                line: desc.line,
                source: std::io::Error::other(e),
            })?;
            let handle = line
                .request(LineRequestFlags::OUTPUT, 0, consumer)
                .map_err(|e| DriverError::GpioOpen {
                    chip: desc.chip.clone(),
                    line: desc.line,
                    source: std::io::Error::other(e),
                })?;
            Ok(Self {
                line: handle,
                active_high: desc.active_high,
                desc: format!("{}:{}", desc.chip, desc.line),
            })
        }
    }

    impl DigitalOutput for GpioOutput {
        fn set(&mut self, v: bool) -> Result<(), DriverError> {
            let level = apply_polarity_out(self.active_high, v);
            self.line
                .set_value(level as u8)
                .map_err(|e| DriverError::GpioIo {
                    chip: self.desc.clone(),
                    line: 0,
                    source: std::io::Error::other(e),
                })
        }
    }

    pub struct GpioInput {
        line: gpio_cdev::LineHandle,
        active_high: bool,
        desc: String,
    }

    impl GpioInput {
        pub fn open(desc: &PinDescriptor, consumer: &str) -> Result<Self, DriverError> {
            let mut chip = Chip::new(&desc.chip).map_err(|e| DriverError::GpioOpen {
                chip: desc.chip.clone(),
                line: desc.line,
                source: std::io::Error::other(e),
            })?;
            let line = chip.get_line(desc.line).map_err(|e| DriverError::GpioOpen {
                chip: desc.chip.clone(),
                line: desc.line,
                source: std::io::Error::other(e),
            })?;
            let handle = line
                .request(LineRequestFlags::INPUT, 0, consumer)
                .map_err(|e| DriverError::GpioOpen {
                    chip: desc.chip.clone(),
                    line: desc.line,
                    source: std::io::Error::other(e),
                })?;
            Ok(Self {
                line: handle,
                active_high: desc.active_high,
                desc: format!("{}:{}", desc.chip, desc.line),
            })
        }
    }

    impl DigitalInput for GpioInput {
        fn read_raw(&mut self) -> Result<bool, DriverError> {
            let raw = self.line.get_value().map_err(|e| DriverError::GpioIo {
                chip: self.desc.clone(),
                line: 0,
                source: std::io::Error::other(e),
            })?;
            Ok(apply_polarity_in(self.active_high, raw != 0))
        }
    }
}

/// In-memory fakes for tests and `--simulate` runs.
pub mod sim {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Shared mutable flag a test can flip to drive a `FakeInput`.
    #[derive(Clone)]
    pub struct SharedLevel(Arc<AtomicBool>);

    impl SharedLevel {
        pub fn new(initial: bool) -> Self {
            Self(Arc::new(AtomicBool::new(initial)))
        }

        pub fn set(&self, v: bool) {
            self.0.store(v, Ordering::SeqCst);
        }

        pub fn get(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    pub struct FakeOutput {
        pub level: SharedLevel,
    }

    impl FakeOutput {
        pub fn new() -> Self {
            Self {
                level: SharedLevel::new(false),
            }
        }
    }

    impl DigitalOutput for FakeOutput {
        fn set(&mut self, v: bool) -> Result<(), DriverError> {
            self.level.set(v);
            Ok(())
        }
    }

    pub struct FakeInput {
        pub level: SharedLevel,
    }

    impl FakeInput {
        pub fn new(level: SharedLevel) -> Self {
            Self { level }
        }
    }

    impl DigitalInput for FakeInput {
        fn read_raw(&mut self) -> Result<bool, DriverError> {
            Ok(self.level.get())
        }
    }

    /// A digital input that can act either as a plain level (for reed
    /// switches and opto-detectors) or as a scripted ultrasonic echo, so
    /// integration tests can drive a whole `Sensing` instance - which shares
    /// one `DigitalInput` type across its reed inputs and its rangers' echo
    /// pins - from a single fake type.
    pub enum ScriptableInput {
        Level(SharedLevel),
        Echo(EchoScript),
    }

    impl ScriptableInput {
        pub fn level(initial: bool) -> (Self, SharedLevel) {
            let level = SharedLevel::new(initial);
            (Self::Level(level.clone()), level)
        }

        pub fn echo(clock: Arc<dyn Clock>) -> (Self, EchoHandle) {
            let script = EchoScript::new(clock);
            let handle = script.handle();
            (Self::Echo(script), handle)
        }
    }

    impl DigitalInput for ScriptableInput {
        fn read_raw(&mut self) -> Result<bool, DriverError> {
            match self {
                Self::Level(level) => Ok(level.get()),
                Self::Echo(script) => Ok(script.read()),
            }
        }
    }

    /// `roundtrip_ns: None` means the echo never rises (a timed-out
    /// reading); `Some` is the configured distance, reusable across
    /// repeated `measure_cm()` calls. `high_until_ns` tracks the current
    /// in-progress pulse, reset once it has been observed falling.
    #[derive(Clone, Copy, Default)]
    struct EchoState {
        roundtrip_ns: Option<i64>,
        high_until_ns: Option<i64>,
    }

    pub struct EchoScript {
        clock: Arc<dyn Clock>,
        state: std::sync::Arc<std::sync::Mutex<EchoState>>,
    }

    impl EchoScript {
        fn new(clock: Arc<dyn Clock>) -> Self {
            Self {
                clock,
                state: std::sync::Arc::new(std::sync::Mutex::new(EchoState::default())),
            }
        }

        fn handle(&self) -> EchoHandle {
            EchoHandle {
                state: self.state.clone(),
            }
        }

        fn read(&self) -> bool {
            let mut state = self.state.lock().unwrap();
            let Some(roundtrip_ns) = state.roundtrip_ns else {
                return false;
            };
            match state.high_until_ns {
                None => {
                    state.high_until_ns = Some(self.clock.now_ns() + roundtrip_ns);
                    true
                }
                Some(deadline_ns) => {
                    if self.clock.now_ns() < deadline_ns {
                        true
                    } else {
                        state.high_until_ns = None;
                        false
                    }
                }
            }
        }
    }

    /// Handle a test keeps to arm an `EchoScript`'s next reading.
    #[derive(Clone)]
    pub struct EchoHandle {
        state: std::sync::Arc<std::sync::Mutex<EchoState>>,
    }

    impl EchoHandle {
        /// Arm the echo so every `measure_cm()` reports `cm` centimeters
        /// until re-armed.
        pub fn arm_cm(&self, cm: f64) {
            let roundtrip_ns = (2.0 * cm / 34_300.0 * 1e9) as i64;
            *self.state.lock().unwrap() = EchoState {
                roundtrip_ns: Some(roundtrip_ns),
                high_until_ns: None,
            };
        }

        /// Arm the echo so every `measure_cm()` times out.
        pub fn arm_timeout(&self) {
            *self.state.lock().unwrap() = EchoState::default();
        }
    }
}
