//! AHT21 temperature/humidity sensor driver.
//!
//! Command-level I2C driver: calibrate once, then trigger a measurement
//! and read back a 7-byte frame holding the status byte, a 20-bit
//! humidity word and a 20-bit temperature word.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

const CMD_STATUS: u8 = 0x71;
const CMD_INIT: [u8; 3] = [0xBE, 0x08, 0x00];
const CMD_TRIGGER: [u8; 3] = [0xAC, 0x33, 0x00];

const STATUS_BUSY: u8 = 0x80;
const STATUS_CALIBRATED: u8 = 0x08;

/// Full scale of the 20-bit measurement words.
const FULL_SCALE: f32 = (1u32 << 20) as f32;

/// Retries while the busy bit stays set after the measurement window.
const BUSY_RETRIES: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// °C
    pub temperature: f32,
    /// %RH
    pub humidity: f32,
}

pub struct Aht21<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Aht21<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Aht21<I2C> {
        Aht21 { i2c, address }
    }

    /// Wait out the power-on window and calibrate if the sensor asks for it.
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I2C::Error>> {
        delay.delay_ms(40);

        let status = self.status()?;
        if status & STATUS_CALIBRATED == 0 {
            tracing::debug!(status, "AHT21 not calibrated, sending init");
            self.i2c.write(self.address, &CMD_INIT).map_err(Error::I2c)?;
            delay.delay_ms(10);
        }
        Ok(())
    }

    /// Trigger one measurement and convert it.
    pub fn measure<D: DelayNs>(&mut self, delay: &mut D) -> Result<Measurement, Error<I2C::Error>> {
        self.i2c
            .write(self.address, &CMD_TRIGGER)
            .map_err(Error::I2c)?;
        delay.delay_ms(80);

        let mut frame = [0u8; 7];
        for _ in 0..=BUSY_RETRIES {
            self.i2c.read(self.address, &mut frame).map_err(Error::I2c)?;
            if frame[0] & STATUS_BUSY == 0 {
                return Ok(convert(&frame));
            }
            delay.delay_ms(10);
        }
        Err(Error::Busy)
    }

    fn status(&mut self) -> Result<u8, Error<I2C::Error>> {
        let mut status = [0u8; 1];
        self.i2c
            .write_read(self.address, &[CMD_STATUS], &mut status)
            .map_err(Error::I2c)?;
        Ok(status[0])
    }
}

/// Unpack the two 20-bit words from a measurement frame.
fn convert(frame: &[u8; 7]) -> Measurement {
    let raw_humidity =
        ((frame[1] as u32) << 12) | ((frame[2] as u32) << 4) | ((frame[3] as u32) >> 4);
    let raw_temperature =
        (((frame[3] as u32) & 0x0F) << 16) | ((frame[4] as u32) << 8) | frame[5] as u32;

    Measurement {
        humidity: raw_humidity as f32 / FULL_SCALE * 100.0,
        temperature: raw_temperature as f32 / FULL_SCALE * 200.0 - 50.0,
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error<E> {
    #[error("i2c transfer failed: {0:?}")]
    I2c(E),

    #[error("sensor still busy after the measurement window")]
    Busy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::I2C_ADDR_AHT21;
    use crate::sensors::testing::{NoopDelay, ScriptedBus};

    #[test]
    fn converts_midscale_words() {
        // humidity word = 2^19 (50 %RH), temperature word = 2^19 (50 °C)
        let frame = [0x00, 0x80, 0x00, 0x08, 0x00, 0x00, 0x00];
        let m = convert(&frame);
        assert!((m.humidity - 50.0).abs() < 1e-3);
        assert!((m.temperature - 50.0).abs() < 1e-3);
    }

    #[test]
    fn converts_extremes() {
        let zero = convert(&[0u8; 7]);
        assert_eq!(zero.humidity, 0.0);
        assert_eq!(zero.temperature, -50.0);

        let full = convert(&[0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00]);
        assert!((full.humidity - 100.0).abs() < 0.01);
        assert!((full.temperature - 150.0).abs() < 0.01);
    }

    #[test]
    fn init_calibrates_when_status_asks() {
        // status without the calibrated bit
        let bus = ScriptedBus::with_reads([&[0x00]]);
        let mut sensor = Aht21::new(bus, I2C_ADDR_AHT21);
        sensor.init(&mut NoopDelay).unwrap();

        let writes = &sensor.i2c.writes;
        assert_eq!(writes[0], (I2C_ADDR_AHT21, vec![CMD_STATUS]));
        assert_eq!(writes[1], (I2C_ADDR_AHT21, CMD_INIT.to_vec()));
    }

    #[test]
    fn init_skips_calibration_when_already_calibrated() {
        let bus = ScriptedBus::with_reads([&[STATUS_CALIBRATED]]);
        let mut sensor = Aht21::new(bus, I2C_ADDR_AHT21);
        sensor.init(&mut NoopDelay).unwrap();
        assert_eq!(sensor.i2c.writes.len(), 1);
    }

    #[test]
    fn measure_triggers_and_reads_frame() {
        let frame = [0x00, 0x80, 0x00, 0x08, 0x00, 0x00, 0x00];
        let bus = ScriptedBus::with_reads([&frame]);
        let mut sensor = Aht21::new(bus, I2C_ADDR_AHT21);

        let m = sensor.measure(&mut NoopDelay).unwrap();
        assert!((m.humidity - 50.0).abs() < 1e-3);
        assert_eq!(
            sensor.i2c.writes[0],
            (I2C_ADDR_AHT21, CMD_TRIGGER.to_vec())
        );
    }

    #[test]
    fn measure_gives_up_when_busy_persists() {
        let busy = [STATUS_BUSY, 0, 0, 0, 0, 0, 0];
        let bus = ScriptedBus::with_reads([&busy, &busy, &busy, &busy]);
        let mut sensor = Aht21::new(bus, I2C_ADDR_AHT21);
        assert!(matches!(sensor.measure(&mut NoopDelay), Err(Error::Busy)));
    }
}
