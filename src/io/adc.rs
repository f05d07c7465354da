//! ADS1115 single-shot, single-ended ADC driver over I2C.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::DriverError;

const REG_CONV: u8 = 0x00;
const REG_CFG: u8 = 0x01;

const PGA_4V096: u16 = 0x0200;
const MODE_SINGLE: u16 = 0x0100;
const DR_860SPS: u16 = 0x00E0;
const MUX_BASE: u16 = 0x4000; // AINx vs GND
const COMP_DISABLE: u16 = 0x0003;
const OS_START: u16 = 0x8000;
const OS_READY: u16 = 0x8000;

const VREF: f64 = 4.096;
const CODES: f64 = 32768.0;
const READY_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// An I2C bus capable of ADS1115-style combined write/read transfers.
pub trait I2cBus: Send {
    fn write(&mut self, addr: u16, bytes: &[u8]) -> Result<(), DriverError>;
    fn write_read(&mut self, addr: u16, out: &[u8], in_buf: &mut [u8]) -> Result<(), DriverError>;
}

/// Single-shot ADS1115 driver (§4.3).
pub struct Ads1115<B: I2cBus> {
    bus: B,
    addr: u16,
    clock: Arc<dyn Clock>,
}

impl<B: I2cBus> Ads1115<B> {
    pub fn new(bus: B, addr: u16, clock: Arc<dyn Clock>) -> Self {
        Self { bus, addr, clock }
    }

    fn write_reg(&mut self, reg: u8, val: u16) -> Result<(), DriverError> {
        let bytes = [reg, (val >> 8) as u8, (val & 0xFF) as u8];
        self.bus.write(self.addr, &bytes)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u16, DriverError> {
        let mut buf = [0u8; 2];
        self.bus.write_read(self.addr, &[reg], &mut buf)?;
        Ok(((buf[0] as u16) << 8) | buf[1] as u16)
    }

    /// Perform one single-shot conversion on `channel` (0..=3) and return volts.
    pub fn read_single(&mut self, channel: u8) -> Result<f64, DriverError> {
        debug_assert!(channel <= 3);
        let mux = MUX_BASE | ((channel as u16) << 12);
        let cfg = OS_START | mux | PGA_4V096 | MODE_SINGLE | DR_860SPS | COMP_DISABLE;
        self.write_reg(REG_CFG, cfg)?;

        let deadline = self.clock.now_ns() + READY_POLL_TIMEOUT.as_nanos() as i64;
        loop {
            let status = self.read_reg(REG_CFG)? & 0x8000;
            if status == OS_READY {
                break;
            }
            if self.clock.now_ns() > deadline {
                return Err(DriverError::AdcTimeout(READY_POLL_TIMEOUT));
            }
            self.clock.sleep(Duration::from_micros(200));
        }

        let raw = self.read_reg(REG_CONV)?;
        let signed = if raw & 0x8000 != 0 {
            -(((!raw) & 0xFFFF) as i32 + 1)
        } else {
            raw as i32
        };
        Ok((signed as f64 / CODES) * VREF)
    }
}

/// Linux I2C backend via `linux-embedded-hal`.
pub mod linux {
    use super::*;
    use linux_embedded_hal::I2cdev;

    pub struct LinuxI2cBus {
        dev: I2cdev,
    }

    impl LinuxI2cBus {
        pub fn open(path: &str) -> Result<Self, DriverError> {
            let dev = I2cdev::new(path).map_err(|e| DriverError::I2cOpen {
                dev: path.to_string(),
                source: e.into(),
            })?;
            Ok(Self { dev })
        }
    }

    impl I2cBus for LinuxI2cBus {
        fn write(&mut self, addr: u16, bytes: &[u8]) -> Result<(), DriverError> {
            use embedded_hal::i2c::I2c;
            self.dev
                .write(addr as u8, bytes)
                .map_err(|e| DriverError::I2cTransfer(e.to_string()))
        }

        fn write_read(
            &mut self,
            addr: u16,
            out: &[u8],
            in_buf: &mut [u8],
        ) -> Result<(), DriverError> {
            use embedded_hal::i2c::I2c;
            self.dev
                .write_read(addr as u8, out, in_buf)
                .map_err(|e| DriverError::I2cTransfer(e.to_string()))
        }
    }
}

/// In-memory fake for tests: a caller-programmable sequence of register
/// reads and an observable write log.
pub mod sim {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    pub struct FakeI2cBus {
        pub reg_values: std::collections::HashMap<u8, VecDeque<u16>>,
        pub writes: Vec<(u8, u16)>,
    }

    impl FakeI2cBus {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue the 16-bit value `reg` will return on its next read.
        pub fn push_reg(&mut self, reg: u8, value: u16) {
            self.reg_values.entry(reg).or_default().push_back(value);
        }
    }

    impl I2cBus for FakeI2cBus {
        fn write(&mut self, _addr: u16, bytes: &[u8]) -> Result<(), DriverError> {
            if bytes.len() == 3 {
                let val = ((bytes[1] as u16) << 8) | bytes[2] as u16;
                self.writes.push((bytes[0], val));
            }
            Ok(())
        }

        fn write_read(
            &mut self,
            _addr: u16,
            out: &[u8],
            in_buf: &mut [u8],
        ) -> Result<(), DriverError> {
            let reg = out[0];
            let val = self
                .reg_values
                .get_mut(&reg)
                .and_then(|q| if q.len() > 1 { q.pop_front() } else { q.front().copied() })
                .unwrap_or(0);
            in_buf[0] = (val >> 8) as u8;
            in_buf[1] = (val & 0xFF) as u8;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::sim::FakeI2cBus;
    use super::*;
    use crate::clock::sim::FakeClock;

    #[test]
    fn read_single_scales_positive_code() {
        let clock = Arc::new(FakeClock::new());
        let mut bus = FakeI2cBus::new();
        bus.push_reg(REG_CFG, OS_READY);
        bus.push_reg(REG_CONV, 16384); // half-scale positive
        let mut adc = Ads1115::new(bus, 0x48, clock);
        let v = adc.read_single(0).unwrap();
        assert!((v - 2.048).abs() < 1e-6);
    }

    #[test]
    fn read_single_sign_extends_negative_code() {
        let clock = Arc::new(FakeClock::new());
        let mut bus = FakeI2cBus::new();
        bus.push_reg(REG_CFG, OS_READY);
        bus.push_reg(REG_CONV, 0xFFFF); // -1 code
        let mut adc = Ads1115::new(bus, 0x48, clock);
        let v = adc.read_single(1).unwrap();
        assert!(v < 0.0);
    }

    #[test]
    fn read_single_times_out_if_never_ready() {
        let clock = Arc::new(FakeClock::new());
        let mut bus = FakeI2cBus::new();
        bus.push_reg(REG_CFG, 0x0000);
        let mut adc = Ads1115::new(bus, 0x48, clock);
        let err = adc.read_single(0).unwrap_err();
        assert!(matches!(err, DriverError::AdcTimeout(_)));
    }
}
